use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use picfest_core::slideshow::{Slideshow, SlideshowConfig};
use picfest_core::slug;
use picfest_platform::{MediaSubscription, Platform, PlatformResult, Store};
use picfest_types::events::{LiveCommand, LiveEventInfo, LiveFrame, MediaChange};
use picfest_types::models::Event;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Bytes of a rejected command echoed into the log.
const RAW_LOG_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub slideshow: SlideshowConfig,
    /// Full reload of the approved list, in case the change feed misses rows.
    pub poll_interval: Duration,
    /// Base URL of the web app, used for the guest join link.
    pub public_url: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            slideshow: SlideshowConfig::default(),
            poll_interval: Duration::from_secs(15),
            public_url: "http://localhost:3000".into(),
        }
    }
}

/// Event shown by `/live/{slug}`. Links that carry the event id instead of
/// its code still resolve.
pub async fn resolve_live_event(store: &dyn Store, slug: &str) -> PlatformResult<Option<Event>> {
    let code = slug::normalize(slug);
    if let Some(event) = store.event_by_slug(&code).await? {
        return Ok(Some(event));
    }
    if slug::looks_like_id(slug) {
        if let Ok(id) = slug.trim().parse::<Uuid>() {
            return store.event_by_id(id).await;
        }
    }
    Ok(None)
}

/// Serve one live display until it disconnects.
pub async fn handle_live_connection(
    socket: WebSocket,
    platform: Platform,
    config: LiveConfig,
    slug: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let event = match resolve_live_event(platform.store.as_ref(), &slug).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            warn!("Live display asked for unknown event '{}'", slug);
            send_frame(&mut sender, &LiveFrame::NotFound { slug }).await;
            let _ = sender.close().await;
            return;
        }
        Err(e) => {
            warn!("Live display lookup for '{}' failed: {}", slug, e);
            let _ = sender.close().await;
            return;
        }
    };

    info!("Live display connected to {} ({})", event.name, event.id);
    let event_id = event.id;

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_recv = pong_received.clone();
    let (command_tx, command_rx) = mpsc::channel::<LiveCommand>(16);

    let mut send_task = tokio::spawn(drive_display(
        sender,
        command_rx,
        pong_received,
        platform,
        config,
        event,
    ));

    // Read commands from the display
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<LiveCommand>(&text) {
                    Ok(cmd) => {
                        if command_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(
                            "Live display bad command: {} -- raw: {}",
                            e,
                            log_excerpt(&text, RAW_LOG_LIMIT)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Live display for event {} disconnected", event_id);
}

/// At most `max` bytes of `text`, cut on a char boundary.
fn log_excerpt(text: &str, max: usize) -> &str {
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

async fn send_frame<S>(sink: &mut S, frame: &LiveFrame) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(frame) {
        Ok(text) => sink.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode live frame: {}", e);
            true
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at.into()).await,
        None => std::future::pending().await,
    }
}

async fn next_change(feed: &mut Option<MediaSubscription>) -> Option<MediaChange> {
    match feed {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

/// Owns the slideshow of one display: timers, change feed, polling and
/// heartbeat all funnel through one `select!`, and every visible change is
/// pushed as a `LiveFrame`.
pub(crate) async fn drive_display<S>(
    mut sink: S,
    mut commands: mpsc::Receiver<LiveCommand>,
    pong_received: Arc<AtomicBool>,
    platform: Platform,
    config: LiveConfig,
    event: Event,
) where
    S: Sink<Message> + Unpin,
{
    let info = LiveEventInfo::from_event(&event, &config.public_url);
    let mut show = Slideshow::new(config.slideshow);

    match platform.store.media_by_event(event.id, true).await {
        Ok(items) => {
            show.set_media(items, Instant::now());
        }
        Err(e) => warn!("Initial media load for event {} failed: {}", event.id, e),
    }

    let mut feed = match platform.feed.subscribe_media(event.id).await {
        Ok(sub) => Some(sub),
        Err(e) => {
            warn!("Change feed unavailable for event {}, polling only: {}", event.id, e);
            None
        }
    };

    if !send_frame(&mut sink, &show.view(&info)).await {
        return;
    }

    let mut poll = tokio::time::interval(config.poll_interval);
    poll.tick().await;
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    loop {
        let deadline = show.next_deadline();

        let changed = tokio::select! {
            _ = sleep_until(deadline) => show.tick(Instant::now()),

            change = next_change(&mut feed) => match change {
                Some(change) => {
                    // Rows from the change feed carry no uploader profile.
                    let needs_profile = match &change {
                        MediaChange::Insert(m) | MediaChange::Update(m) if m.profile.is_none() => {
                            Some((m.id, m.uploader_id))
                        }
                        _ => None,
                    };
                    let mut changed = show.apply(change, Instant::now());
                    if let Some((media_id, uploader_id)) = needs_profile {
                        match platform.store.profile(uploader_id).await {
                            Ok(Some(profile)) => changed |= show.attach_profile(media_id, profile),
                            Ok(None) => {}
                            Err(e) => debug!("Uploader profile {} not loaded: {}", uploader_id, e),
                        }
                    }
                    changed
                }
                None => {
                    warn!("Change feed for event {} closed, polling only", event.id);
                    feed = None;
                    false
                }
            },

            _ = poll.tick() => match platform.store.media_by_event(event.id, true).await {
                Ok(fresh) => show.merge_poll(fresh, Instant::now()),
                Err(e) => {
                    warn!("Media poll for event {} failed: {}", event.id, e);
                    false
                }
            },

            cmd = commands.recv() => match cmd {
                Some(LiveCommand::VideoEnded { media_id }) => show.video_ended(media_id, Instant::now()),
                None => break,
            },

            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout (missed {} pongs), dropping live display", missed_heartbeats);
                        break;
                    }
                }
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
                false
            }
        };

        if changed && !send_frame(&mut sink, &show.view(&info)).await {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use picfest_db::Database;
    use picfest_types::models::{Media, MediaKind, NewEvent, NewMedia, Role};

    async fn setup() -> (Platform, Event, Uuid) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let organizer = Uuid::new_v4();
        db.create_account(&organizer.to_string(), "org@test.com", "x", Role::Organizer, "Org")
            .unwrap();
        let storage: PathBuf = std::env::temp_dir().join(format!("picfest-live-{}", Uuid::new_v4()));
        let platform = picfest_platform::local::platform(
            db,
            "test-secret".into(),
            storage,
            "http://localhost:3000/files",
        );
        let event = platform
            .store
            .create_event(&NewEvent {
                name: "Gala".into(),
                slug: "GALA01".into(),
                date: None,
                organizer_id: organizer,
                config: Default::default(),
            })
            .await
            .unwrap();
        (platform, event, organizer)
    }

    #[tokio::test]
    async fn resolves_by_code_or_id() {
        let (platform, event, _) = setup().await;
        let store = platform.store.as_ref();

        let by_code = resolve_live_event(store, " gala01 ").await.unwrap();
        assert_eq!(by_code.map(|e| e.id), Some(event.id));

        let by_id = resolve_live_event(store, &event.id.to_string()).await.unwrap();
        assert_eq!(by_id.map(|e| e.id), Some(event.id));

        assert!(resolve_live_event(store, "NOPE").await.unwrap().is_none());
    }

    async fn add_media(platform: &Platform, event: &Event, uploader: Uuid, kind: MediaKind, name: &str) -> Media {
        platform
            .store
            .insert_media(&NewMedia {
                event_id: event.id,
                uploader_id: uploader,
                kind,
                caption: None,
                url: format!("http://localhost:3000/files/{}", name),
                approved: true,
            })
            .await
            .unwrap()
    }

    struct Display {
        frames: mpsc::UnboundedReceiver<String>,
        commands: mpsc::Sender<LiveCommand>,
        driver: tokio::task::JoinHandle<()>,
    }

    impl Display {
        fn start(platform: &Platform, event: &Event, slideshow: SlideshowConfig) -> Self {
            let (frame_tx, frames) = mpsc::unbounded_channel::<String>();
            let sink = Box::pin(futures_util::sink::unfold(frame_tx, |tx, msg: Message| async move {
                if let Message::Text(text) = msg {
                    let _ = tx.send(text.as_str().to_string());
                }
                Ok::<_, std::convert::Infallible>(tx)
            }));
            let (commands, command_rx) = mpsc::channel(4);
            let config = LiveConfig {
                slideshow,
                ..Default::default()
            };
            let driver = tokio::spawn(drive_display(
                sink,
                command_rx,
                Arc::new(AtomicBool::new(true)),
                platform.clone(),
                config,
                event.clone(),
            ));
            Self { frames, commands, driver }
        }

        async fn next(&mut self) -> LiveFrame {
            let text = tokio::time::timeout(Duration::from_secs(2), self.frames.recv())
                .await
                .expect("no frame within 2s")
                .unwrap();
            serde_json::from_str(&text).unwrap()
        }

        async fn quiet_for(&mut self, period: Duration) -> bool {
            tokio::time::timeout(period, self.frames.recv()).await.is_err()
        }

        fn current(frame: &LiveFrame) -> Uuid {
            match frame {
                LiveFrame::Showing { current, .. } => current.id,
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    impl Drop for Display {
        fn drop(&mut self) {
            self.driver.abort();
        }
    }

    #[tokio::test]
    async fn display_waits_then_shows_new_media() {
        let (platform, event, organizer) = setup().await;
        let mut display = Display::start(
            &platform,
            &event,
            SlideshowConfig {
                photo_interval: Duration::from_millis(50),
                highlight_delay: Duration::from_millis(10),
                queue_len: 5,
            },
        );

        assert!(matches!(display.next().await, LiveFrame::Waiting { .. }));

        let media = add_media(&platform, &event, organizer, MediaKind::Photo, "a.jpg").await;

        match display.next().await {
            LiveFrame::Showing { current, photo_ms, event: info, .. } => {
                assert_eq!(current.id, media.id);
                assert_eq!(photo_ms, Some(50));
                assert_eq!(info.join_url, "http://localhost:3000/#/evento/GALA01");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn video_advances_only_on_its_own_ended_command() {
        let (platform, event, organizer) = setup().await;
        let photo = add_media(&platform, &event, organizer, MediaKind::Photo, "a.jpg").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let video = add_media(&platform, &event, organizer, MediaKind::Video, "b.mp4").await;

        let mut display = Display::start(
            &platform,
            &event,
            SlideshowConfig {
                photo_interval: Duration::from_secs(10),
                highlight_delay: Duration::from_millis(10),
                queue_len: 5,
            },
        );

        let first = display.next().await;
        assert_eq!(Display::current(&first), video.id);
        assert!(matches!(first, LiveFrame::Showing { photo_ms: None, .. }));

        // No timer runs for a video
        assert!(display.quiet_for(Duration::from_millis(100)).await);

        display
            .commands
            .send(LiveCommand::VideoEnded { media_id: Uuid::new_v4() })
            .await
            .unwrap();
        assert!(display.quiet_for(Duration::from_millis(100)).await);

        display
            .commands
            .send(LiveCommand::VideoEnded { media_id: video.id })
            .await
            .unwrap();
        assert_eq!(Display::current(&display.next().await), photo.id);
    }

    #[tokio::test]
    async fn fresh_media_is_highlighted_after_delay() {
        let (platform, event, organizer) = setup().await;
        let older = add_media(&platform, &event, organizer, MediaKind::Photo, "a.jpg").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer = add_media(&platform, &event, organizer, MediaKind::Photo, "b.jpg").await;

        let mut display = Display::start(
            &platform,
            &event,
            SlideshowConfig {
                photo_interval: Duration::from_millis(200),
                highlight_delay: Duration::from_millis(20),
                queue_len: 5,
            },
        );
        assert_eq!(Display::current(&display.next().await), newer.id);
        assert_eq!(Display::current(&display.next().await), older.id);

        let fresh = add_media(&platform, &event, organizer, MediaKind::Photo, "c.jpg").await;

        // The list shifts first; the jump to the new head follows the delay
        let mut seen = Vec::new();
        for _ in 0..3 {
            let id = Display::current(&display.next().await);
            seen.push(id);
            if id == fresh.id {
                break;
            }
        }
        assert_eq!(seen.last(), Some(&fresh.id));
        assert!(seen.len() >= 2, "jumped without the highlight delay: {:?}", seen);
    }

    #[test]
    fn log_excerpt_respects_char_boundaries() {
        let euros = "\u{20ac}".repeat(100);
        let cut = log_excerpt(&euros, RAW_LOG_LIMIT);
        assert_eq!(cut.len(), 198);
        assert!(euros.starts_with(cut));

        assert_eq!(log_excerpt("short", RAW_LOG_LIMIT), "short");
        assert_eq!(log_excerpt("ação", 2), "a");
    }
}
