use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use picfest_core::routes::Viewer;
use picfest_types::models::{AuthUser, Profile, Role};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Signed-in caller, inserted as a request extension by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: AuthUser,
    pub profile: Option<Profile>,
    pub token: String,
}

impl CurrentUser {
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    pub fn viewer(&self) -> Viewer {
        Viewer::Authenticated(self.role())
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Resolve the bearer token through the platform. `None` for anonymous
/// callers and for tokens the platform no longer accepts.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<CurrentUser>> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    let Some(user) = state.platform.auth.session(&token).await? else {
        return Ok(None);
    };
    let profile = state.platform.store.profile(user.id).await?;
    Ok(Some(CurrentUser {
        user,
        profile,
        token,
    }))
}

/// Validate the bearer token and attach the caller to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = current_user(&state, req.headers())
        .await?
        .ok_or(ApiError::Unauthorized)?;
    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

async fn require_role(role: Role, req: Request, next: Next) -> Result<Response, ApiError> {
    let current = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(ApiError::Unauthorized)?;
    if current.role() != Some(role) {
        return Err(ApiError::forbidden());
    }
    Ok(next.run(req).await)
}

/// Runs after `require_auth`.
pub async fn require_organizer(req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(Role::Organizer, req, next).await
}

/// Runs after `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(Role::Admin, req, next).await
}
