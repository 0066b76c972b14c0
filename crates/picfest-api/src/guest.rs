use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use picfest_core::slug;
use picfest_core::wizard::{StagedFile, Submission, UploadWizard, WizardError};
use picfest_platform::paths;
use picfest_types::api::{CaptionRequest, StagedFileInfo, WizardView};
use picfest_types::models::{Event, GuestProfileInput, Media, MediaKind, NewMedia};

use crate::error::{ApiError, ApiResult};
use crate::events::plan_for;
use crate::state::AppState;
use crate::upload;

/// One guest going through the upload wizard of one event.
pub struct GuestSession {
    wizard: UploadWizard,
    event: Event,
    last_seen: Instant,
}

impl GuestSession {
    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    fn view(&self, id: Uuid) -> WizardView {
        let w = &self.wizard;
        WizardView {
            session_id: id,
            event_id: self.event.id,
            event_name: self.event.name.clone(),
            step: w.step().number(),
            profile: w.profile().clone(),
            can_proceed: w.can_proceed(),
            has_profile_photo: w.profile_photo().is_some(),
            media: w.media().map(file_info),
            caption: w.caption().to_string(),
            show_on_screen: w.show_on_screen(),
            submitting: w.is_submitting(),
            error: w.error().map(str::to_string),
            uploaded: w.uploaded().cloned(),
        }
    }
}

fn file_info(file: &StagedFile) -> StagedFileInfo {
    StagedFileInfo {
        file_name: file.file_name.clone(),
        content_type: file.content_type.clone(),
        size: file.size(),
    }
}

/// In-memory wizard sessions, keyed by an unguessable id handed to the
/// guest's browser. Idle sessions are dropped by `sweep`.
pub struct WizardRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<GuestSession>>>>,
    ttl: Duration,
}

impl WizardRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self, event: Event) -> (Uuid, Arc<Mutex<GuestSession>>) {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(GuestSession {
            wizard: UploadWizard::new(),
            event,
            last_seen: Instant::now(),
        }));
        self.sessions.write().await.insert(id, session.clone());
        (id, session)
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Arc<Mutex<GuestSession>>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Upload session"))
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<Mutex<GuestSession>>> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than the TTL. Sessions locked by a
    /// request right now are left alone. Starting and settling a submit both
    /// count as activity, so only an upload stuck past the TTL is dropped.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let Ok(mut guard) = session.try_lock() else {
                return true;
            };
            let idle = now.saturating_duration_since(guard.last_seen);
            if idle < self.ttl {
                return true;
            }
            guard.wizard.discard();
            debug!("Upload session {} expired after {:?}", id, idle);
            false
        });
        before - sessions.len()
    }
}

/// Periodically drop abandoned wizard sessions and the files they hold.
pub async fn run_sweep_loop(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let removed = state.wizards.sweep(Instant::now()).await;
        if removed > 0 {
            info!("Swept {} idle upload sessions", removed);
        }
    }
}

/// Apply one wizard transition and return the new view.
async fn update<F>(state: &AppState, id: Uuid, f: F) -> ApiResult<Json<WizardView>>
where
    F: FnOnce(&mut UploadWizard) -> Result<(), WizardError>,
{
    let session = state.wizards.get(id).await?;
    let mut session = session.lock().await;
    session.touch();
    f(&mut session.wizard)?;
    Ok(Json(session.view(id)))
}

/// POST /guest/{slug}/sessions
pub async fn start_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let event = state
        .platform
        .store
        .event_by_slug(&slug::normalize(&code))
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    if !event.is_open() {
        return Err(ApiError::Conflict("This event is no longer accepting uploads".into()));
    }

    let (id, session) = state.wizards.create(event).await;
    let view = session.lock().await.view(id);
    info!("Upload session {} started for event {}", id, view.event_id);
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WizardView>> {
    update(&state, id, |_| Ok(())).await
}

pub async fn set_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(profile): Json<GuestProfileInput>,
) -> ApiResult<Json<WizardView>> {
    update(&state, id, |w| w.set_profile(profile)).await
}

pub async fn set_profile_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<WizardView>> {
    let file = upload::read_file(multipart).await?;
    if !upload::is_image(&file) {
        return Err(ApiError::BadRequest("Profile photo must be an image".into()));
    }
    update(&state, id, |w| w.stage_profile_photo(file)).await
}

pub async fn proceed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WizardView>> {
    update(&state, id, UploadWizard::proceed).await
}

pub async fn back(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WizardView>> {
    update(&state, id, UploadWizard::back_to_profile).await
}

pub async fn select_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<WizardView>> {
    let file = upload::read_file(multipart).await?;
    if MediaKind::from_content_type(&file.content_type).is_none() {
        return Err(ApiError::BadRequest("Only photos and videos can be sent".into()));
    }
    update(&state, id, |w| w.select_media(file)).await
}

pub async fn set_caption(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CaptionRequest>,
) -> ApiResult<Json<WizardView>> {
    update(&state, id, |w| {
        w.set_caption(req.caption)?;
        w.set_show_on_screen(req.show_on_screen)
    })
    .await
}

/// POST /guest/sessions/{id}/submit: upload the staged file. The session
/// lock is released while talking to the platform so the guest's browser
/// can keep polling the view. The upload runs on its own task, so the
/// wizard always leaves the submitting state even if the request is dropped.
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WizardView>> {
    let session = state.wizards.get(id).await?;
    let (submission, event_id) = {
        let mut session = session.lock().await;
        session.touch();
        (session.wizard.begin_submit()?, session.event.id)
    };

    let task = tokio::spawn(settle_submit(
        state.clone(),
        session.clone(),
        id,
        event_id,
        submission,
    ));
    match task.await {
        Ok(view) => view.map(Json),
        Err(e) => {
            let mut session = session.lock().await;
            if let Err(stale) = session.wizard.finish_submit(Err("Upload failed".into())) {
                debug!("Upload session {} already settled: {}", id, stale);
            }
            Err(ApiError::Internal(anyhow::anyhow!("upload task for session {} failed: {}", id, e)))
        }
    }
}

async fn settle_submit(
    state: AppState,
    session: Arc<Mutex<GuestSession>>,
    id: Uuid,
    event_id: Uuid,
    submission: Submission,
) -> ApiResult<WizardView> {
    let outcome = perform_upload(&state, event_id, submission).await;

    let mut session = session.lock().await;
    session.touch();
    match outcome {
        Ok(media) => {
            info!("Upload session {} sent media {}", id, media.id);
            session.wizard.finish_submit(Ok(media))?;
            Ok(session.view(id))
        }
        Err(e) => {
            warn!("Upload session {} failed: {}", id, e);
            session.wizard.finish_submit(Err(e.to_string()))?;
            Err(e)
        }
    }
}

async fn perform_upload(state: &AppState, event_id: Uuid, submission: Submission) -> ApiResult<Media> {
    let platform = &state.platform;

    // The organizer may have closed the event since the session started
    let event = platform
        .store
        .event_by_id(event_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    if !event.is_open() {
        return Err(ApiError::Conflict("This event is no longer accepting uploads".into()));
    }

    let media = submission.media;
    let kind = MediaKind::from_content_type(&media.content_type)
        .ok_or_else(|| ApiError::BadRequest("Only photos and videos can be sent".into()))?;

    if let Some(plan) = plan_for(state, event.organizer_id).await? {
        let count = platform.store.count_media_by_event(event.id).await?;
        if !plan.allows_another_media(count) {
            return Err(ApiError::Forbidden("This event has reached its upload limit".into()));
        }
    }

    let profile = platform.store.get_or_create_guest(&submission.profile).await?;

    if let Some(photo) = submission.profile_photo {
        let ext = paths::extension_for(photo.extension().as_deref(), &photo.content_type);
        let path = paths::profile_photo_path(profile.id, &ext, Utc::now());
        // The badge photo is a nicety; the media still goes up without it
        match platform
            .storage
            .upload(&path, photo.bytes, &photo.content_type, true)
            .await
        {
            Ok(url) => {
                if let Err(e) = platform.store.set_profile_photo(profile.id, &url).await {
                    warn!("Profile photo of {} not linked: {}", profile.id, e);
                }
            }
            Err(e) => warn!("Profile photo of {} not stored: {}", profile.id, e),
        }
    }

    let ext = paths::extension_for(media.extension().as_deref(), &media.content_type);
    let path = paths::event_media_path(event.id, &ext, Utc::now());
    let url = platform
        .storage
        .upload(&path, media.bytes, &media.content_type, false)
        .await?;

    let row = NewMedia {
        event_id: event.id,
        uploader_id: profile.id,
        kind,
        caption: submission.caption,
        url,
        approved: submission.show_on_screen && !event.config.moderation,
    };
    match platform.store.insert_media(&row).await {
        Ok(media) => Ok(media),
        Err(e) => {
            if let Err(cleanup) = platform.storage.delete(&path).await {
                warn!("Orphaned object {} left behind: {}", path, cleanup);
            }
            Err(e.into())
        }
    }
}

pub async fn send_another(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WizardView>> {
    update(&state, id, UploadWizard::send_another).await
}

pub async fn discard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let session = state
        .wizards
        .remove(id)
        .await
        .ok_or_else(|| ApiError::not_found("Upload session"))?;
    session.lock().await.wizard.discard();
    debug!("Upload session {} discarded", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use picfest_types::models::{EventConfig, EventStatus};

    fn event() -> Event {
        Event {
            id: Uuid::new_v4(),
            name: "Casamento".into(),
            slug: "ANABEL".into(),
            date: None,
            organizer_id: Uuid::new_v4(),
            status: EventStatus::Active,
            config: EventConfig::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sweep_drops_only_idle_sessions() {
        let registry = WizardRegistry::new(Duration::from_secs(60));
        let (stale, _) = registry.create(event()).await;
        let (fresh, fresh_session) = registry.create(event()).await;

        let later = Instant::now() + Duration::from_secs(61);
        fresh_session.lock().await.last_seen = later;

        assert_eq!(registry.sweep(later).await, 1);
        assert!(registry.get(stale).await.is_err());
        assert!(registry.get(fresh).await.is_ok());
        assert_eq!(registry.len().await, 1);
    }

    fn staged_photo() -> StagedFile {
        StagedFile {
            file_name: "bolo.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: bytes::Bytes::from_static(b"jpeg"),
        }
    }

    #[tokio::test]
    async fn sweep_drops_uploads_stuck_past_the_ttl() {
        let registry = WizardRegistry::new(Duration::from_secs(60));
        let (id, session) = registry.create(event()).await;
        {
            let mut session = session.lock().await;
            session
                .wizard
                .set_profile(GuestProfileInput {
                    name: "Bia".into(),
                    email: "bia@festa.com".into(),
                    ..Default::default()
                })
                .unwrap();
            session.wizard.proceed().unwrap();
            session.wizard.select_media(staged_photo()).unwrap();
            session.wizard.begin_submit().unwrap();
        }

        assert_eq!(registry.sweep(Instant::now()).await, 0);

        let much_later = Instant::now() + Duration::from_secs(365 * 24 * 3600);
        assert_eq!(registry.sweep(much_later).await, 1);
        assert!(registry.get(id).await.is_err());
        assert!(session.lock().await.wizard.media().is_none());
    }

    #[tokio::test]
    async fn view_reflects_wizard_state() {
        let registry = WizardRegistry::new(Duration::from_secs(60));
        let (id, session) = registry.create(event()).await;
        let mut session = session.lock().await;

        let view = session.view(id);
        assert_eq!(view.step, 1);
        assert!(!view.can_proceed);
        assert!(view.show_on_screen);

        session
            .wizard
            .set_profile(GuestProfileInput {
                name: "Bia".into(),
                email: "bia@festa.com".into(),
                ..Default::default()
            })
            .unwrap();
        session.wizard.proceed().unwrap();
        session
            .wizard
            .select_media(staged_photo())
            .unwrap();

        let view = session.view(id);
        assert_eq!(view.step, 3);
        assert_eq!(view.media.map(|m| m.size), Some(4));
    }
}
