use sha1::{Digest, Sha1};

/// Uppercase an address so near-duplicate spellings share a cache entry.
pub fn normalize(address: &str) -> String {
    address.to_uppercase()
}

/// Derive the cache key for a normalized address. Hash keys are SHA-1 hex
/// digests; slug keys are human-readable but collide more readily on
/// punctuation and diacritics. Every input maps to some key, empty included.
pub fn derive_key(address: &str, use_slug: bool) -> String {
    if use_slug {
        slugify(address)
    } else {
        hex::encode(Sha1::digest(address.as_bytes()))
    }
}

fn slugify(value: &str) -> String {
    let filtered = value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>();
    let collapsed = filtered
        .split('-')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        "address".into()
    } else {
        collapsed
    }
}
