use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

/// Bucket holding event media and profile photos.
pub const MEDIA_BUCKET: &str = "midias";

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// `eventos/{event_id}/{millis}-{rand}.{ext}`
pub fn event_media_path(event_id: Uuid, ext: &str, now: DateTime<Utc>) -> String {
    format!(
        "eventos/{}/{}-{}.{}",
        event_id,
        now.timestamp_millis(),
        random_suffix(6),
        ext
    )
}

/// `profiles/{user_id}-{millis}.{ext}`
pub fn profile_photo_path(user_id: Uuid, ext: &str, now: DateTime<Utc>) -> String {
    format!("profiles/{}-{}.{}", user_id, now.timestamp_millis(), ext)
}

/// Extension to store a blob under: the file name's, else one derived from
/// the content type.
pub fn extension_for(file_ext: Option<&str>, content_type: &str) -> String {
    if let Some(ext) = file_ext.filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric())) {
        return ext.to_string();
    }
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let event = Uuid::nil();

        let path = event_media_path(event, "jpg", now);
        assert!(path.starts_with("eventos/00000000-0000-0000-0000-000000000000/1700000000123-"));
        assert!(path.ends_with(".jpg"));

        assert_eq!(
            profile_photo_path(event, "png", now),
            "profiles/00000000-0000-0000-0000-000000000000-1700000000123.png"
        );
    }

    #[test]
    fn extension_falls_back_to_mime() {
        assert_eq!(extension_for(Some("jpeg"), "image/jpeg"), "jpeg");
        assert_eq!(extension_for(None, "video/quicktime"), "mov");
        assert_eq!(extension_for(Some("../x"), "image/png"), "png");
    }
}
