use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, warn};
use uuid::Uuid;

use picfest_platform::PlatformError;
use picfest_types::api::SetApprovalRequest;
use picfest_types::models::Media;

use crate::error::{ApiError, ApiResult};
use crate::events::owned_event;
use crate::middleware::CurrentUser;
use crate::state::AppState;

async fn fetch(state: &AppState, id: Uuid) -> ApiResult<Media> {
    state
        .platform
        .store
        .media(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Media"))
}

async fn set_approval(state: &AppState, id: Uuid, approved: bool) -> ApiResult<Json<Media>> {
    let media = state.platform.store.set_media_approval(id, approved).await?;
    info!("Media {} approved={}", id, approved);
    Ok(Json(media))
}

/// Delete the row, then the stored object behind it. A missing object is
/// not an error; the row is what the displays read.
async fn remove(state: &AppState, media: Media) -> ApiResult<StatusCode> {
    state.platform.store.delete_media(media.id).await?;

    if let Some(path) = state.platform.storage.path_for_url(&media.url) {
        match state.platform.storage.delete(&path).await {
            Ok(()) | Err(PlatformError::NotFound) => {}
            Err(e) => warn!("Stored object {} of media {} not removed: {}", path, media.id, e),
        }
    }
    info!("Media {} deleted", media.id);
    Ok(StatusCode::NO_CONTENT)
}

// -- Organizer: only media of their own events --

pub async fn organizer_set_approval(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetApprovalRequest>,
) -> ApiResult<Json<Media>> {
    let media = fetch(&state, id).await?;
    owned_event(&state, &current, media.event_id).await?;
    set_approval(&state, id, req.approved).await
}

pub async fn organizer_delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let media = fetch(&state, id).await?;
    owned_event(&state, &current, media.event_id).await?;
    remove(&state, media).await
}

// -- Admin --

pub async fn admin_set_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetApprovalRequest>,
) -> ApiResult<Json<Media>> {
    set_approval(&state, id, req.approved).await
}

pub async fn admin_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let media = fetch(&state, id).await?;
    remove(&state, media).await
}
