use axum::{
    Extension, Json,
    extract::{Multipart, State},
};
use chrono::Utc;
use tracing::info;

use picfest_platform::paths;
use picfest_types::models::{Profile, ProfileUpdate};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::state::AppState;
use crate::upload;

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<Profile>> {
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".into()));
    }
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("Name is required".into()));
    }
    let profile = state
        .platform
        .store
        .update_profile(current.user.id, &update)
        .await?;
    Ok(Json(profile))
}

/// PUT /profile/photo: multipart `file`, images only.
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<Json<Profile>> {
    let file = upload::read_file(multipart).await?;
    if !upload::is_image(&file) {
        return Err(ApiError::BadRequest("Profile photo must be an image".into()));
    }

    let ext = paths::extension_for(file.extension().as_deref(), &file.content_type);
    let path = paths::profile_photo_path(current.user.id, &ext, Utc::now());
    let url = state
        .platform
        .storage
        .upload(&path, file.bytes, &file.content_type, true)
        .await?;
    state
        .platform
        .store
        .set_profile_photo(current.user.id, &url)
        .await?;
    info!("Profile photo of {} stored at {}", current.user.id, path);

    let profile = state
        .platform
        .store
        .profile(current.user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))?;
    Ok(Json(profile))
}
