use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Event, Media, MediaKind};

/// A row-level change on `midias`, as delivered by the platform's change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MediaChange {
    Insert(Media),
    Update(Media),
    Delete { id: Uuid },
}

impl MediaChange {
    pub fn media_id(&self) -> Uuid {
        match self {
            Self::Insert(m) | Self::Update(m) => m.id,
            Self::Delete { id } => *id,
        }
    }
}

/// Upcoming item the display should start fetching before it is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadHint {
    pub media_id: Uuid,
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEventInfo {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    /// Guest upload link encoded into the on-screen QR code.
    pub join_url: String,
}

impl LiveEventInfo {
    pub fn from_event(event: &Event, public_url: &str) -> Self {
        Self {
            id: event.id,
            name: event.name.clone(),
            slug: event.slug.clone(),
            join_url: format!("{}/#/evento/{}", public_url.trim_end_matches('/'), event.slug),
        }
    }
}

/// Frames pushed to a live display socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LiveFrame {
    /// No event resolved for the requested slug.
    NotFound { slug: String },

    /// Event known but nothing approved yet.
    Waiting { event: LiveEventInfo },

    /// Current item plus what comes next.
    Showing {
        event: LiveEventInfo,
        current: Media,
        up_next: Vec<Media>,
        preload: Vec<PreloadHint>,
        /// Photo display time (progress bar length). Absent for videos,
        /// which advance on `VideoEnded`.
        photo_ms: Option<u64>,
    },
}

/// Commands sent from a live display to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LiveCommand {
    /// The currently playing video reached its end.
    VideoEnded { media_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_command_wire_format() {
        let id = Uuid::nil();
        let raw = format!(r#"{{"type":"VideoEnded","data":{{"media_id":"{}"}}}}"#, id);
        let cmd: LiveCommand = serde_json::from_str(&raw).unwrap();
        assert_eq!(cmd, LiveCommand::VideoEnded { media_id: id });
    }

    #[test]
    fn join_url_uses_hash_route() {
        let event = Event {
            id: Uuid::new_v4(),
            name: "Tech Gala".into(),
            slug: "AB12CD".into(),
            date: None,
            organizer_id: Uuid::new_v4(),
            status: crate::models::EventStatus::Active,
            config: Default::default(),
            created_at: chrono::Utc::now(),
        };
        let info = LiveEventInfo::from_event(&event, "https://picfest.app/");
        assert_eq!(info.join_url, "https://picfest.app/#/evento/AB12CD");
    }
}
