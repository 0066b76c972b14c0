use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use picfest_types::events::{LiveEventInfo, LiveFrame, MediaChange, PreloadHint};
use picfest_types::models::{Media, MediaKind, Profile};

use crate::media_feed::MediaFeed;

#[derive(Debug, Clone, Copy)]
pub struct SlideshowConfig {
    /// How long a photo stays on screen. Also the length of the progress bar.
    pub photo_interval: Duration,
    /// Delay before jumping to freshly arrived media.
    pub highlight_delay: Duration,
    /// Length of the "up next" strip and of the preload window.
    pub queue_len: usize,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            photo_interval: Duration::from_secs(8),
            highlight_delay: Duration::from_secs(1),
            queue_len: 5,
        }
    }
}

/// Rotation state of one live display.
///
/// Photos advance after `photo_interval`; videos stay until the display
/// reports that playback ended. When a new item shows up at the head of the
/// list, the rotation jumps back to it after `highlight_delay`.
#[derive(Debug)]
pub struct Slideshow {
    config: SlideshowConfig,
    feed: MediaFeed,
    index: usize,
    last_head: Option<Uuid>,
    advance_at: Option<Instant>,
    highlight_at: Option<Instant>,
}

impl Slideshow {
    pub fn new(config: SlideshowConfig) -> Self {
        Self {
            config,
            feed: MediaFeed::new(true),
            index: 0,
            last_head: None,
            advance_at: None,
            highlight_at: None,
        }
    }

    pub fn config(&self) -> &SlideshowConfig {
        &self.config
    }

    pub fn media(&self) -> &[Media] {
        self.feed.items()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Replace the whole list (initial load).
    pub fn set_media(&mut self, items: Vec<Media>, now: Instant) -> bool {
        let before = self.current_id();
        self.feed.load(items);
        self.reconcile(now);
        self.current_id() != before
    }

    /// Polling fallback; only reconciles when the feed accepted the list.
    /// Returns whether the list was replaced.
    pub fn merge_poll(&mut self, fresh: Vec<Media>, now: Instant) -> bool {
        if !self.feed.merge_poll(fresh) {
            return false;
        }
        self.reconcile(now);
        true
    }

    /// Apply one change notification. Returns whether anything visible changed.
    pub fn apply(&mut self, change: MediaChange, now: Instant) -> bool {
        if !self.feed.apply(change) {
            return false;
        }
        self.reconcile(now);
        true
    }

    pub fn attach_profile(&mut self, media_id: Uuid, profile: Profile) -> bool {
        self.feed.attach_profile(media_id, profile)
    }

    fn reconcile(&mut self, now: Instant) {
        let len = self.feed.len();
        if len == 0 {
            self.index = 0;
            self.advance_at = None;
            self.highlight_at = None;
            return;
        }
        if self.index >= len {
            self.index = len - 1;
        }

        let head = self.feed.head_id();
        if head != self.last_head {
            if self.last_head.is_some() {
                debug!("New media at head, highlighting in {:?}", self.config.highlight_delay);
                self.highlight_at = Some(now + self.config.highlight_delay);
            }
            self.last_head = head;
        }

        self.arm(now);
    }

    /// Restart the photo timer for whatever is current.
    fn arm(&mut self, now: Instant) {
        self.advance_at = match self.current() {
            Some(m) if m.kind == MediaKind::Photo => Some(now + self.config.photo_interval),
            _ => None,
        };
    }

    fn move_to(&mut self, index: usize, now: Instant) -> bool {
        if index == self.index {
            return false;
        }
        self.index = index;
        self.arm(now);
        true
    }

    fn advance(&mut self, now: Instant) -> bool {
        let len = self.feed.len();
        if len == 0 {
            return false;
        }
        self.move_to((self.index + 1) % len, now)
    }

    /// Fire due timers. Returns whether the current item changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.highlight_at.is_some_and(|at| at <= now) {
            self.highlight_at = None;
            return self.move_to(0, now);
        }
        if self.advance_at.is_some_and(|at| at <= now) {
            self.advance_at = None;
            return self.advance(now);
        }
        false
    }

    /// Advance past the current video, but only if it is the one that ended.
    pub fn video_ended(&mut self, media_id: Uuid, now: Instant) -> bool {
        match self.current() {
            Some(m) if m.id == media_id && m.kind == MediaKind::Video => self.advance(now),
            _ => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.advance_at, self.highlight_at) {
            (Some(a), Some(h)) => Some(a.min(h)),
            (a, h) => a.or(h),
        }
    }

    pub fn current(&self) -> Option<&Media> {
        self.feed.items().get(self.index)
    }

    fn current_id(&self) -> Option<Uuid> {
        self.current().map(|m| m.id)
    }

    /// The next `queue_len` items after the current one, wrapping around.
    /// Short lists repeat.
    pub fn up_next(&self) -> Vec<&Media> {
        let items = self.feed.items();
        if items.is_empty() {
            return Vec::new();
        }
        (1..=self.config.queue_len)
            .map(|i| &items[(self.index + i) % items.len()])
            .collect()
    }

    /// Distinct URLs among the upcoming items.
    pub fn preload(&self) -> Vec<PreloadHint> {
        let mut hints: Vec<PreloadHint> = Vec::new();
        for media in self.up_next() {
            if hints.iter().any(|h| h.url == media.url) {
                continue;
            }
            hints.push(PreloadHint {
                media_id: media.id,
                url: media.url.clone(),
                kind: media.kind,
            });
        }
        hints
    }

    pub fn view(&self, event: &LiveEventInfo) -> LiveFrame {
        match self.current() {
            None => LiveFrame::Waiting {
                event: event.clone(),
            },
            Some(current) => LiveFrame::Showing {
                event: event.clone(),
                current: current.clone(),
                up_next: self.up_next().into_iter().cloned().collect(),
                preload: self.preload(),
                photo_ms: (current.kind == MediaKind::Photo)
                    .then(|| self.config.photo_interval.as_millis() as u64),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(kind: MediaKind) -> Media {
        let id = Uuid::new_v4();
        Media {
            id,
            event_id: Uuid::nil(),
            uploader_id: Uuid::nil(),
            kind,
            caption: None,
            url: format!("https://cdn.test/{}", id),
            approved: true,
            created_at: Utc::now(),
            profile: None,
        }
    }

    fn event() -> LiveEventInfo {
        LiveEventInfo {
            id: Uuid::nil(),
            name: "Gala".into(),
            slug: "GALA01".into(),
            join_url: "http://localhost/#/evento/GALA01".into(),
        }
    }

    #[test]
    fn empty_list_waits_without_timers() {
        let mut show = Slideshow::new(SlideshowConfig::default());
        let now = Instant::now();
        show.set_media(Vec::new(), now);

        assert!(matches!(show.view(&event()), LiveFrame::Waiting { .. }));
        assert_eq!(show.next_deadline(), None);
        assert!(!show.tick(now + Duration::from_secs(60)));
    }

    #[test]
    fn photos_advance_after_interval() {
        let config = SlideshowConfig::default();
        let mut show = Slideshow::new(config);
        let t0 = Instant::now();
        let a = item(MediaKind::Photo);
        let b = item(MediaKind::Photo);
        show.set_media(vec![a.clone(), b.clone()], t0);

        assert_eq!(show.current().map(|m| m.id), Some(a.id));
        assert_eq!(show.next_deadline(), Some(t0 + config.photo_interval));

        assert!(!show.tick(t0 + config.photo_interval - Duration::from_millis(1)));
        assert!(show.tick(t0 + config.photo_interval));
        assert_eq!(show.current().map(|m| m.id), Some(b.id));

        // wraps
        let t1 = t0 + config.photo_interval;
        assert!(show.tick(t1 + config.photo_interval));
        assert_eq!(show.current().map(|m| m.id), Some(a.id));
    }

    #[test]
    fn videos_wait_for_ended() {
        let mut show = Slideshow::new(SlideshowConfig::default());
        let t0 = Instant::now();
        let video = item(MediaKind::Video);
        let photo = item(MediaKind::Photo);
        show.set_media(vec![video.clone(), photo.clone()], t0);

        assert_eq!(show.next_deadline(), None);
        assert!(!show.tick(t0 + Duration::from_secs(600)));

        // a stale "ended" from some other item is ignored
        assert!(!show.video_ended(photo.id, t0));
        assert!(show.video_ended(video.id, t0));
        assert_eq!(show.current().map(|m| m.id), Some(photo.id));
        assert!(show.next_deadline().is_some());
    }

    #[test]
    fn new_head_is_highlighted_after_delay() {
        let config = SlideshowConfig::default();
        let mut show = Slideshow::new(config);
        let t0 = Instant::now();
        let a = item(MediaKind::Photo);
        let b = item(MediaKind::Photo);
        show.set_media(vec![a.clone(), b], t0);
        show.tick(t0 + config.photo_interval);
        assert_eq!(show.index(), 1);

        let fresh = item(MediaKind::Photo);
        let t1 = t0 + config.photo_interval + Duration::from_millis(100);
        assert!(show.apply(MediaChange::Insert(fresh.clone()), t1));
        assert_eq!(show.next_deadline(), Some(t1 + config.highlight_delay));

        assert!(show.tick(t1 + config.highlight_delay));
        assert_eq!(show.current().map(|m| m.id), Some(fresh.id));
        assert_eq!(
            show.next_deadline(),
            Some(t1 + config.highlight_delay + config.photo_interval)
        );
    }

    #[test]
    fn first_head_is_not_highlighted() {
        let mut show = Slideshow::new(SlideshowConfig::default());
        let t0 = Instant::now();
        show.set_media(vec![item(MediaKind::Video)], t0);
        assert_eq!(show.next_deadline(), None);
    }

    #[test]
    fn index_clamps_when_list_shrinks() {
        let config = SlideshowConfig::default();
        let mut show = Slideshow::new(config);
        let t0 = Instant::now();
        let a = item(MediaKind::Photo);
        let b = item(MediaKind::Photo);
        show.set_media(vec![a.clone(), b.clone()], t0);
        show.tick(t0 + config.photo_interval);

        show.apply(MediaChange::Delete { id: b.id }, t0 + config.photo_interval);
        assert_eq!(show.current().map(|m| m.id), Some(a.id));
    }

    #[test]
    fn queue_wraps_and_preload_is_distinct() {
        let mut show = Slideshow::new(SlideshowConfig::default());
        let t0 = Instant::now();
        let a = item(MediaKind::Photo);
        let b = item(MediaKind::Video);
        show.set_media(vec![a.clone(), b.clone()], t0);

        let next: Vec<Uuid> = show.up_next().iter().map(|m| m.id).collect();
        assert_eq!(next, vec![b.id, a.id, b.id, a.id, b.id]);

        let preload = show.preload();
        assert_eq!(preload.len(), 2);
        assert_eq!(preload[0].kind, MediaKind::Video);

        match show.view(&event()) {
            LiveFrame::Showing { photo_ms, .. } => assert_eq!(photo_ms, Some(8000)),
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
