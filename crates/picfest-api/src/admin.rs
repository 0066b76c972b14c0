use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use picfest_types::api::{SetRoleRequest, SetSubscriptionRequest};
use picfest_types::models::{
    ConfigEntry, Event, PlatformMetrics, Profile, Role, Subscription,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub async fn metrics(State(state): State<AppState>) -> ApiResult<Json<PlatformMetrics>> {
    Ok(Json(state.platform.store.metrics().await?))
}

pub async fn users(State(state): State<AppState>) -> ApiResult<Json<Vec<Profile>>> {
    Ok(Json(state.platform.store.list_profiles().await?))
}

pub async fn set_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetRoleRequest>,
) -> ApiResult<Json<Profile>> {
    // Keeps at least the caller able to reach the admin panel
    if id == current.user.id && req.role != Role::Admin {
        return Err(ApiError::BadRequest("Admins cannot demote themselves".into()));
    }
    state.platform.store.set_role(id, req.role).await?;
    let profile = state
        .platform
        .store
        .profile(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))?;
    info!("Admin {} set role of {} to {}", current.user.id, id, req.role);
    Ok(Json(profile))
}

pub async fn events(State(state): State<AppState>) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(state.platform.store.all_events().await?))
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConfigEntry>> {
    let entry = state
        .platform
        .store
        .config(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Config"))?;
    Ok(Json(entry))
}

pub async fn put_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(content): Json<Value>,
) -> ApiResult<Json<ConfigEntry>> {
    if id.trim().is_empty() || id.len() > 64 {
        return Err(ApiError::BadRequest("Invalid config id".into()));
    }
    Ok(Json(state.platform.store.upsert_config(&id, &content).await?))
}

pub async fn set_subscription(
    State(state): State<AppState>,
    Path(organizer_id): Path<Uuid>,
    Json(req): Json<SetSubscriptionRequest>,
) -> ApiResult<Json<Subscription>> {
    let organizer = state
        .platform
        .store
        .profile(organizer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organizer"))?;
    if organizer.role != Role::Organizer {
        return Err(ApiError::BadRequest("Only organizers hold subscriptions".into()));
    }
    let plans = state.platform.store.plans(true).await?;
    if !plans.iter().any(|p| p.id == req.plan_id) {
        return Err(ApiError::not_found("Plan"));
    }

    let subscription = state
        .platform
        .store
        .upsert_subscription(organizer_id, req.plan_id, req.status, req.expires_at)
        .await?;
    info!(
        "Subscription of {} set to {} on plan {}",
        organizer_id,
        req.status.as_str(),
        req.plan_id
    );
    Ok(Json(subscription))
}
