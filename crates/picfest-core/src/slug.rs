use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GENERATED_LEN: usize = 6;

/// Random 6-character event code, as printed under the QR code.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn normalize(input: &str) -> String {
    input.trim().to_uppercase()
}

/// 4 to 32 characters of `A-Z`, `0-9` and `-`. Expects normalized input.
pub fn is_valid(slug: &str) -> bool {
    (4..=32).contains(&slug.len())
        && slug
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-')
}

/// Live display links sometimes carry the event id instead of the slug.
pub fn looks_like_id(value: &str) -> bool {
    value.len() > 20
}
