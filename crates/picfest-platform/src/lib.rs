//! Seam between the application and the hosted backend: auth, tables,
//! object storage and the realtime change feed. `local` runs everything
//! in-process for development and tests; `supabase` talks to the hosted
//! project over HTTP and websockets.

pub mod error;
pub mod local;
pub mod paths;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use picfest_types::events::MediaChange;
use picfest_types::models::{
    AuthUser, ConfigEntry, Event, EventStatus, GuestProfileInput, Media, NewEvent, NewMedia,
    NewTestimonial, Plan, PlanDraft, PlatformMetrics, Profile, ProfileUpdate, Role, Session,
    Subscription, SubscriptionStatus, Testimonial,
};

pub use error::PlatformError;

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Result of a sign-up. The session is absent when the platform asks the
/// user to confirm their email first.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub user: AuthUser,
    pub session: Option<Session>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create the account and its profile row.
    async fn sign_up(&self, email: &str, password: &str, name: &str, role: Role)
    -> PlatformResult<SignUp>;
    async fn sign_in(&self, email: &str, password: &str) -> PlatformResult<Session>;
    async fn sign_out(&self, token: &str) -> PlatformResult<()>;
    /// Resolve a bearer token. `None` when it is expired, revoked or unknown.
    async fn session(&self, token: &str) -> PlatformResult<Option<AuthUser>>;
    async fn reset_password(&self, email: &str) -> PlatformResult<()>;
    async fn update_password(&self, token: &str, new_password: &str) -> PlatformResult<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    // -- Profiles --
    async fn profile(&self, id: Uuid) -> PlatformResult<Option<Profile>>;
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> PlatformResult<Profile>;
    async fn list_profiles(&self) -> PlatformResult<Vec<Profile>>;
    async fn set_role(&self, id: Uuid, role: Role) -> PlatformResult<()>;
    /// Idempotent by email: returns the existing profile when there is one.
    async fn get_or_create_guest(&self, guest: &GuestProfileInput) -> PlatformResult<Profile>;
    async fn set_profile_photo(&self, id: Uuid, url: &str) -> PlatformResult<()>;

    // -- Events --
    async fn create_event(&self, event: &NewEvent) -> PlatformResult<Event>;
    async fn event_by_slug(&self, slug: &str) -> PlatformResult<Option<Event>>;
    async fn event_by_id(&self, id: Uuid) -> PlatformResult<Option<Event>>;
    async fn events_by_organizer(&self, organizer_id: Uuid) -> PlatformResult<Vec<Event>>;
    async fn all_events(&self) -> PlatformResult<Vec<Event>>;
    async fn set_event_status(&self, id: Uuid, status: EventStatus) -> PlatformResult<Event>;
    async fn count_events_by_organizer(&self, organizer_id: Uuid) -> PlatformResult<i64>;

    // -- Media --
    async fn insert_media(&self, media: &NewMedia) -> PlatformResult<Media>;
    /// Newest first, uploader profiles joined.
    async fn media_by_event(&self, event_id: Uuid, approved_only: bool) -> PlatformResult<Vec<Media>>;
    async fn media(&self, id: Uuid) -> PlatformResult<Option<Media>>;
    async fn set_media_approval(&self, id: Uuid, approved: bool) -> PlatformResult<Media>;
    async fn delete_media(&self, id: Uuid) -> PlatformResult<()>;
    async fn count_media_by_event(&self, event_id: Uuid) -> PlatformResult<i64>;

    // -- Plans --
    async fn plans(&self, include_inactive: bool) -> PlatformResult<Vec<Plan>>;
    async fn create_plan(&self, draft: &PlanDraft) -> PlatformResult<Plan>;
    async fn update_plan(&self, id: Uuid, draft: &PlanDraft) -> PlatformResult<Plan>;
    async fn delete_plan(&self, id: Uuid) -> PlatformResult<()>;

    // -- Subscriptions --
    /// Latest subscription with status `ativo`, plan joined.
    async fn active_subscription_for(&self, organizer_id: Uuid)
    -> PlatformResult<Option<Subscription>>;
    async fn upsert_subscription(
        &self,
        organizer_id: Uuid,
        plan_id: Uuid,
        status: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> PlatformResult<Subscription>;

    // -- Testimonials --
    async fn testimonials(&self, approved_only: bool) -> PlatformResult<Vec<Testimonial>>;
    async fn create_testimonial(&self, testimonial: &NewTestimonial) -> PlatformResult<Testimonial>;
    async fn set_testimonial_approval(&self, id: Uuid, approved: bool) -> PlatformResult<Testimonial>;

    // -- General configuration --
    async fn config(&self, id: &str) -> PlatformResult<Option<ConfigEntry>>;
    async fn upsert_config(&self, id: &str, content: &Value) -> PlatformResult<ConfigEntry>;

    async fn metrics(&self) -> PlatformResult<PlatformMetrics>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store a blob and return its public URL.
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> PlatformResult<String>;
    fn public_url(&self, path: &str) -> String;
    /// Inverse of `public_url`, for URLs this storage handed out.
    fn path_for_url(&self, url: &str) -> Option<String>;
    async fn delete(&self, path: &str) -> PlatformResult<()>;
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe_media(&self, event_id: Uuid) -> PlatformResult<MediaSubscription>;
}

/// Stream of media changes for one event. Dropping it unsubscribes.
pub struct MediaSubscription {
    rx: mpsc::Receiver<MediaChange>,
    task: Option<JoinHandle<()>>,
}

impl MediaSubscription {
    pub fn new(rx: mpsc::Receiver<MediaChange>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// `None` once the feed has shut down.
    pub async fn recv(&mut self) -> Option<MediaChange> {
        self.rx.recv().await
    }
}

impl Drop for MediaSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The backend the application runs against.
#[derive(Clone)]
pub struct Platform {
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn ObjectStorage>,
    pub feed: Arc<dyn ChangeFeed>,
}
