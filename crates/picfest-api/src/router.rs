use std::path::PathBuf;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use crate::middleware::{require_admin, require_auth, require_organizer};
use crate::state::AppState;
use crate::{admin, auth, events, guest, media, navigation, plans, profiles, testimonials};

/// Every HTTP route of the application. `files_dir` is served read-only
/// under `/files` when the local storage binding is in use.
pub fn build_router(state: AppState, files_dir: Option<PathBuf>) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/routes/resolve", get(navigation::resolve))
        .route("/config/landing", get(navigation::landing))
        .route("/events/by-slug/{slug}", get(events::event_by_slug))
        .route("/live/{slug}", get(events::live_snapshot))
        .route("/live/{slug}/ws", get(events::live_socket))
        .route("/testimonials", get(testimonials::list_public))
        .route("/plans", get(plans::list_active))
        .with_state(state.clone());

    let guest_routes = Router::new()
        .route("/guest/{slug}/sessions", post(guest::start_session))
        .route(
            "/guest/sessions/{id}",
            get(guest::get_session).delete(guest::discard),
        )
        .route("/guest/sessions/{id}/profile", put(guest::set_profile))
        .route("/guest/sessions/{id}/profile-photo", put(guest::set_profile_photo))
        .route("/guest/sessions/{id}/proceed", post(guest::proceed))
        .route("/guest/sessions/{id}/back", post(guest::back))
        .route("/guest/sessions/{id}/media", put(guest::select_media))
        .route("/guest/sessions/{id}/caption", put(guest::set_caption))
        .route("/guest/sessions/{id}/submit", post(guest::submit))
        .route("/guest/sessions/{id}/again", post(guest::send_another))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::update_password))
        .route("/profile", put(profiles::update_profile))
        .route("/profile/photo", put(profiles::upload_photo))
        .route("/testimonials", post(testimonials::create))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let organizer_routes = Router::new()
        .route(
            "/dashboard/events",
            get(events::list_events).post(events::create_event),
        )
        .route("/dashboard/events/{id}/status", put(events::set_event_status))
        .route("/dashboard/events/{id}/media", get(events::event_media))
        .route("/dashboard/media/{id}/approval", put(media::organizer_set_approval))
        .route("/dashboard/media/{id}", delete(media::organizer_delete))
        .route(
            "/dashboard/subscription",
            get(events::subscription).post(events::subscribe),
        )
        .layer(middleware::from_fn(require_organizer))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/metrics", get(admin::metrics))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/{id}/role", put(admin::set_role))
        .route("/admin/events", get(admin::events))
        .route("/admin/testimonials", get(testimonials::list_all))
        .route("/admin/testimonials/{id}/approval", put(testimonials::set_approval))
        .route("/admin/plans", get(plans::list_all).post(plans::create))
        .route("/admin/plans/{id}", put(plans::update).delete(plans::delete))
        .route("/admin/media/{id}/approval", put(media::admin_set_approval))
        .route("/admin/media/{id}", delete(media::admin_delete))
        .route(
            "/admin/config/{id}",
            get(admin::get_config).put(admin::put_config),
        )
        .route("/admin/subscriptions/{organizer_id}", put(admin::set_subscription))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let mut app = Router::new()
        .merge(public_routes)
        .merge(guest_routes)
        .merge(protected_routes)
        .merge(organizer_routes)
        .merge(admin_routes);

    if let Some(dir) = files_dir {
        app = app.nest_service("/files", ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(state.max_upload_bytes))
}
