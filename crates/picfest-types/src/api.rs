use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AuthUser, Event, EventStatus, GuestProfileInput, Media, Profile, Role, SubscriptionStatus,
};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "nome")]
    pub name: String,
    /// Self-registration may only pick organizer or guest.
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Absent after sign-up when the platform wants the email confirmed
    /// before the first sign-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user: AuthUser,
    pub profile: Option<Profile>,
    /// Where the shell should land after signing in.
    pub home: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
    pub profile: Option<Profile>,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "data_evento", default)]
    pub date: Option<NaiveDate>,
    /// Generated when blank.
    #[serde(rename = "slug_curto", default)]
    pub slug: Option<String>,
    #[serde(rename = "moderacao_ativa", default)]
    pub moderation: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetEventStatusRequest {
    pub status: EventStatus,
}

#[derive(Debug, Serialize)]
pub struct LiveSnapshot {
    pub event: Event,
    pub media: Vec<Media>,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetApprovalRequest {
    #[serde(rename = "aprovado")]
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRoleRequest {
    pub role: Role,
}

// -- Subscriptions --

/// Organizer picks a plan; the subscription starts pending until an admin
/// activates it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscribeRequest {
    #[serde(rename = "plano_id")]
    pub plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetSubscriptionRequest {
    #[serde(rename = "plano_id")]
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    #[serde(rename = "expira_em", default)]
    pub expires_at: Option<DateTime<Utc>>,
}

// -- Testimonials --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTestimonialRequest {
    #[serde(rename = "estrelas")]
    pub stars: u8,
    #[serde(rename = "texto")]
    pub text: String,
}

// -- Guest upload wizard --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptionRequest {
    #[serde(rename = "legenda", default)]
    pub caption: String,
    #[serde(default = "default_show_on_screen")]
    pub show_on_screen: bool,
}

fn default_show_on_screen() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct StagedFileInfo {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

/// Snapshot of a guest wizard session.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub session_id: Uuid,
    pub event_id: Uuid,
    pub event_name: String,
    pub step: u8,
    pub profile: GuestProfileInput,
    pub can_proceed: bool,
    pub has_profile_photo: bool,
    pub media: Option<StagedFileInfo>,
    #[serde(rename = "legenda")]
    pub caption: String,
    pub show_on_screen: bool,
    pub submitting: bool,
    pub error: Option<String>,
    pub uploaded: Option<Media>,
}

// -- Navigation --

#[derive(Debug, Deserialize)]
pub struct ResolveRouteQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct RouteDecision {
    pub path: String,
    pub allowed: bool,
    pub redirect: Option<String>,
}
