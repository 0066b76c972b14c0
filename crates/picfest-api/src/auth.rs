use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use picfest_core::routes::home_for;
use picfest_types::api::{
    AuthResponse, LoginRequest, MeResponse, RegisterRequest, ResetPasswordRequest,
    UpdatePasswordRequest,
};
use picfest_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

fn validate_credentials(email: &str, password: &str) -> ApiResult<()> {
    if !email.contains('@') || email.len() > 254 {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim();
    validate_credentials(&email, &req.password)?;
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".into()));
    }

    // Admins are promoted, never self-registered
    let role = match req.role.unwrap_or(Role::Organizer) {
        Role::Admin => return Err(ApiError::BadRequest("Role not allowed".into())),
        role => role,
    };

    let signup = state
        .platform
        .auth
        .sign_up(&email, &req.password, name, role)
        .await?;
    let profile = state.platform.store.profile(signup.user.id).await?;
    info!("Registered {} as {}", signup.user.id, role);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: signup.session.map(|s| s.access_token),
            home: home_for(profile.as_ref().map(|p| p.role)).path(),
            user: signup.user,
            profile,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();
    let session = state.platform.auth.sign_in(&email, &req.password).await?;
    let profile = state.platform.store.profile(session.user.id).await?;

    Ok(Json(AuthResponse {
        token: Some(session.access_token),
        home: home_for(profile.as_ref().map(|p| p.role)).path(),
        user: session.user,
        profile,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    state.platform.auth.sign_out(&current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user: current.user,
        profile: current.profile,
    })
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<StatusCode> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    state.platform.auth.reset_password(&email).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdatePasswordRequest>,
) -> ApiResult<StatusCode> {
    validate_credentials(&current.user.email, &req.password)?;
    state
        .platform
        .auth
        .update_password(&current.token, &req.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_rules() {
        assert!(validate_credentials("ana@festa.com", "segredo").is_ok());
        assert!(validate_credentials("ana.festa.com", "segredo").is_err());
        assert!(validate_credentials("ana@festa.com", "123").is_err());
    }
}
