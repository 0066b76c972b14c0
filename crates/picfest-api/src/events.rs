use axum::{
    Extension, Json,
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use picfest_core::slug;
use picfest_gateway::{handle_live_connection, resolve_live_event};
use picfest_platform::PlatformError;
use picfest_types::api::{CreateEventRequest, LiveSnapshot, SetEventStatusRequest, SubscribeRequest};
use picfest_types::models::{
    Event, EventConfig, Media, NewEvent, Plan, Subscription, SubscriptionStatus,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Attempts at drawing a free code before giving up.
const SLUG_ATTEMPTS: usize = 5;

/// Plan of the organizer's latest active subscription, if any. Organizers
/// without a subscription are not limited.
pub(crate) async fn plan_for(state: &AppState, organizer_id: Uuid) -> ApiResult<Option<Plan>> {
    let subscription = state
        .platform
        .store
        .active_subscription_for(organizer_id)
        .await?;
    Ok(subscription.and_then(|s| s.plan))
}

/// Event owned by the caller. Someone else's event reads as forbidden.
pub(crate) async fn owned_event(state: &AppState, current: &CurrentUser, id: Uuid) -> ApiResult<Event> {
    let event = state
        .platform
        .store
        .event_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    if event.organizer_id != current.user.id {
        return Err(ApiError::forbidden());
    }
    Ok(event)
}

// -- Organizer dashboard --

pub async fn list_events(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Event>>> {
    let events = state
        .platform
        .store
        .events_by_organizer(current.user.id)
        .await?;
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    if name.is_empty() || name.len() > 120 {
        return Err(ApiError::BadRequest("Event name must be 1-120 characters".into()));
    }

    let requested = req
        .slug
        .as_deref()
        .map(slug::normalize)
        .filter(|s| !s.is_empty());
    if let Some(code) = &requested {
        if !slug::is_valid(code) {
            return Err(ApiError::BadRequest(
                "Code must be 4-32 letters, digits or dashes".into(),
            ));
        }
    }

    if let Some(plan) = plan_for(&state, current.user.id).await? {
        let count = state
            .platform
            .store
            .count_events_by_organizer(current.user.id)
            .await?;
        if !plan.allows_another_event(count) {
            return Err(ApiError::Forbidden(format!(
                "Plan {} allows {} events",
                plan.name, plan.event_limit
            )));
        }
    }

    let mut draft = NewEvent {
        name: name.to_string(),
        slug: requested.clone().unwrap_or_else(slug::generate),
        date: req.date,
        organizer_id: current.user.id,
        config: EventConfig {
            moderation: req.moderation,
            ..Default::default()
        },
    };

    let mut attempts = 0;
    let event = loop {
        attempts += 1;
        match state.platform.store.create_event(&draft).await {
            Ok(event) => break event,
            // A drawn code may already be taken; a chosen one is the caller's problem.
            Err(PlatformError::Conflict(_)) if requested.is_none() && attempts < SLUG_ATTEMPTS => {
                draft.slug = slug::generate();
            }
            Err(PlatformError::Conflict(_)) => {
                return Err(ApiError::Conflict(format!("Code {} is already in use", draft.slug)));
            }
            Err(e) => return Err(e.into()),
        }
    };

    info!("Organizer {} created event {} ({})", current.user.id, event.slug, event.id);
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn set_event_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetEventStatusRequest>,
) -> ApiResult<Json<Event>> {
    owned_event(&state, &current, id).await?;
    let event = state.platform.store.set_event_status(id, req.status).await?;
    Ok(Json(event))
}

/// Every item of the event, pending ones included.
pub async fn event_media(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Media>>> {
    owned_event(&state, &current, id).await?;
    let media = state.platform.store.media_by_event(id, false).await?;
    Ok(Json(media))
}

pub async fn subscription(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Option<Subscription>>> {
    let subscription = state
        .platform
        .store
        .active_subscription_for(current.user.id)
        .await?;
    Ok(Json(subscription))
}

pub async fn subscribe(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<impl IntoResponse> {
    // Plan changes on a running subscription go through an admin
    if let Some(active) = state
        .platform
        .store
        .active_subscription_for(current.user.id)
        .await?
    {
        if active.is_current(Utc::now()) {
            return Err(ApiError::Conflict("An active subscription already exists".into()));
        }
    }

    let plans = state.platform.store.plans(false).await?;
    if !plans.iter().any(|p| p.id == req.plan_id) {
        return Err(ApiError::not_found("Plan"));
    }
    let subscription = state
        .platform
        .store
        .upsert_subscription(current.user.id, req.plan_id, SubscriptionStatus::Pending, None)
        .await?;
    info!("Organizer {} requested plan {}", current.user.id, req.plan_id);
    Ok((StatusCode::CREATED, Json(subscription)))
}

// -- Public --

pub async fn event_by_slug(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Event>> {
    let event = state
        .platform
        .store
        .event_by_slug(&slug::normalize(&code))
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    Ok(Json(event))
}

/// Event plus its approved media, for displays that poll instead of
/// holding a socket.
pub async fn live_snapshot(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<LiveSnapshot>> {
    let event = resolve_live_event(state.platform.store.as_ref(), &code)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    let media = state.platform.store.media_by_event(event.id, true).await?;
    Ok(Json(LiveSnapshot { event, media }))
}

/// GET /live/{slug}/ws: credential-free slideshow feed.
pub async fn live_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Response {
    let platform = state.platform.clone();
    let config = state.live.clone();
    ws.on_failed_upgrade(move |e| warn!("Live display upgrade failed: {}", e))
        .on_upgrade(move |socket| handle_live_connection(socket, platform, config, code))
}
