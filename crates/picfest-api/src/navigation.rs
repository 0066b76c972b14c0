use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde_json::{Value, json};

use picfest_core::routes::{Access, Route, Viewer, guard};
use picfest_types::api::{ResolveRouteQuery, RouteDecision};

use crate::error::ApiResult;
use crate::middleware::current_user;
use crate::state::AppState;

/// Configuration row holding the landing page content.
const LANDING_CONFIG: &str = "landing";

fn decide(raw: &str, viewer: Viewer) -> RouteDecision {
    let Some(route) = Route::parse(raw) else {
        return RouteDecision {
            path: raw.to_string(),
            allowed: false,
            redirect: Some(Route::Landing.path()),
        };
    };
    match guard(&route, viewer) {
        Access::Allow => RouteDecision {
            path: route.path(),
            allowed: true,
            redirect: None,
        },
        Access::Redirect(target) => RouteDecision {
            path: route.path(),
            allowed: false,
            redirect: Some(target.path()),
        },
    }
}

/// GET /routes/resolve?path=: may the caller open this page, and where to
/// send them if not. Works with or without a bearer token.
pub async fn resolve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ResolveRouteQuery>,
) -> ApiResult<Json<RouteDecision>> {
    let viewer = current_user(&state, &headers)
        .await?
        .map_or(Viewer::Anonymous, |c| c.viewer());
    Ok(Json(decide(&query.path, viewer)))
}

pub async fn landing(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let content = state
        .platform
        .store
        .config(LANDING_CONFIG)
        .await?
        .map_or_else(|| json!({}), |entry| entry.content);
    Ok(Json(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use picfest_types::models::Role;

    #[test]
    fn unknown_paths_go_home() {
        let decision = decide("/nope/x/y", Viewer::Anonymous);
        assert!(!decision.allowed);
        assert_eq!(decision.redirect.as_deref(), Some("/"));
    }

    #[test]
    fn guest_pages_are_open() {
        let decision = decide("#/evento/ab12cd", Viewer::Anonymous);
        assert!(decision.allowed);
        assert_eq!(decision.path, "/evento/ab12cd");

        let admin = decide("/admin/plans", Viewer::Authenticated(Some(Role::Guest)));
        assert_eq!(admin.redirect.as_deref(), Some("/"));
    }
}
