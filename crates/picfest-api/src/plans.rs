use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use picfest_types::models::{Plan, PlanDraft};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn validate(draft: &PlanDraft) -> ApiResult<()> {
    if draft.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("Plan name is required".into()));
    }
    let negative = [draft.event_limit, draft.media_limit, draft.storage_limit_gb]
        .into_iter()
        .flatten()
        .any(|limit| limit < 0);
    if negative || draft.price.is_some_and(|p| p < 0.0 || !p.is_finite()) {
        return Err(ApiError::BadRequest("Limits and price cannot be negative".into()));
    }
    Ok(())
}

/// Plans offered on the landing page.
pub async fn list_active(State(state): State<AppState>) -> ApiResult<Json<Vec<Plan>>> {
    Ok(Json(state.platform.store.plans(false).await?))
}

pub async fn list_all(State(state): State<AppState>) -> ApiResult<Json<Vec<Plan>>> {
    Ok(Json(state.platform.store.plans(true).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(draft): Json<PlanDraft>,
) -> ApiResult<impl IntoResponse> {
    validate(&draft)?;
    if draft.name.is_none() || draft.price.is_none() {
        return Err(ApiError::BadRequest("Plan name and price are required".into()));
    }
    let plan = state.platform.store.create_plan(&draft).await?;
    info!("Plan {} created", plan.name);
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<PlanDraft>,
) -> ApiResult<Json<Plan>> {
    validate(&draft)?;
    Ok(Json(state.platform.store.update_plan(id, &draft).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.platform.store.delete_plan(id).await?;
    info!("Plan {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
