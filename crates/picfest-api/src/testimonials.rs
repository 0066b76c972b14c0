use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use picfest_types::api::{CreateTestimonialRequest, SetApprovalRequest};
use picfest_types::models::{NewTestimonial, Testimonial};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Approved testimonials shown on the landing page.
pub async fn list_public(State(state): State<AppState>) -> ApiResult<Json<Vec<Testimonial>>> {
    Ok(Json(state.platform.store.testimonials(true).await?))
}

/// New testimonials wait for an admin before they show up.
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateTestimonialRequest>,
) -> ApiResult<impl IntoResponse> {
    if !(1..=5).contains(&req.stars) {
        return Err(ApiError::BadRequest("Stars must be between 1 and 5".into()));
    }
    let text = req.text.trim();
    if text.is_empty() || text.len() > 1000 {
        return Err(ApiError::BadRequest("Text must be 1-1000 characters".into()));
    }

    let (name, photo_url) = match &current.profile {
        Some(profile) => (profile.name.clone(), profile.photo_url.clone()),
        None => (current.user.email.clone(), None),
    };
    let testimonial = state
        .platform
        .store
        .create_testimonial(&NewTestimonial {
            organizer_id: Some(current.user.id),
            name,
            photo_url,
            stars: req.stars,
            text: text.to_string(),
        })
        .await?;
    info!("Testimonial {} submitted by {}", testimonial.id, current.user.id);
    Ok((StatusCode::CREATED, Json(testimonial)))
}

pub async fn list_all(State(state): State<AppState>) -> ApiResult<Json<Vec<Testimonial>>> {
    Ok(Json(state.platform.store.testimonials(false).await?))
}

pub async fn set_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetApprovalRequest>,
) -> ApiResult<Json<Testimonial>> {
    let testimonial = state
        .platform
        .store
        .set_testimonial_approval(id, req.approved)
        .await?;
    Ok(Json(testimonial))
}
