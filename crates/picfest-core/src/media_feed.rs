use tracing::debug;
use uuid::Uuid;

use picfest_types::events::MediaChange;
use picfest_types::models::{Media, Profile};

/// Media list of one event kept in sync with the change feed.
/// Items are ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct MediaFeed {
    approved_only: bool,
    items: Vec<Media>,
}

impl MediaFeed {
    pub fn new(approved_only: bool) -> Self {
        Self {
            approved_only,
            items: Vec::new(),
        }
    }

    pub fn load(&mut self, items: Vec<Media>) {
        self.items = items;
    }

    pub fn items(&self) -> &[Media] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head_id(&self) -> Option<Uuid> {
        self.items.first().map(|m| m.id)
    }

    fn visible(&self, media: &Media) -> bool {
        !self.approved_only || media.approved
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|m| m.id == id)
    }

    /// Apply one change notification. Returns whether the list changed.
    pub fn apply(&mut self, change: MediaChange) -> bool {
        match change {
            MediaChange::Insert(media) => {
                if !self.visible(&media) || self.position(media.id).is_some() {
                    return false;
                }
                debug!("Feed insert {}", media.id);
                self.items.insert(0, media);
                true
            }
            MediaChange::Update(media) => {
                let visible = self.visible(&media);
                match self.position(media.id) {
                    None if visible => {
                        debug!("Feed update surfaced {}", media.id);
                        self.items.insert(0, media);
                        true
                    }
                    None => false,
                    Some(idx) if !visible => {
                        debug!("Feed update hid {}", media.id);
                        self.items.remove(idx);
                        true
                    }
                    Some(idx) => {
                        let existing = &mut self.items[idx];
                        // Change records carry no join; keep the profile we have.
                        let profile = media.profile.or_else(|| existing.profile.take());
                        *existing = Media { profile, ..media };
                        true
                    }
                }
            }
            MediaChange::Delete { id } => match self.position(id) {
                Some(idx) => {
                    self.items.remove(idx);
                    true
                }
                None => false,
            },
        }
    }

    /// Polling fallback. The fresh list replaces the current one only when
    /// its head or its length differs. Returns whether it was replaced.
    pub fn merge_poll(&mut self, fresh: Vec<Media>) -> bool {
        let head_changed = match (fresh.first(), self.items.first()) {
            (Some(new), Some(old)) => new.id != old.id,
            _ => false,
        };
        if head_changed || fresh.len() != self.items.len() {
            debug!("Poll replaced feed ({} -> {} items)", self.items.len(), fresh.len());
            self.items = fresh;
            true
        } else {
            false
        }
    }

    /// Attach an uploader profile fetched after the insert arrived.
    pub fn attach_profile(&mut self, media_id: Uuid, profile: Profile) -> bool {
        match self.position(media_id) {
            Some(idx) => {
                self.items[idx].profile = Some(profile);
                true
            }
            None => false,
        }
    }
}
