//! Idempotency marker embedded in every published body.
//!
//! The literal substring `<!-- powered by seele-review` is the sole
//! persisted state the system relies on across invocations; a trailing
//! `key=<hash>` distinguishes one finding's comment from another within
//! the same run so repeat deliveries update in place instead of
//! duplicating.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::review_item::ReviewItem;

const MARKER_TAG: &str = "powered by seele-review";

/// Builds the marker for a given stable key (an item's identity key, or
/// the literal `"report"` for report mode).
pub fn build_marker(key: &str) -> String {
    format!("<!-- {MARKER_TAG}; key={} -->", key_for(key))
}

/// Hashes an arbitrary stable string into the form embedded in markers.
pub fn key_for(s: &str) -> String {
    hex_sha256(s)
}

/// The stable string form of a `ReviewItem`'s identity key, hashed to
/// produce the marker key embedded in its comment.
pub fn item_key(item: &ReviewItem) -> String {
    hex_sha256(&format!(
        "{}:{}:{}:{:?}",
        item.new_path.as_deref().unwrap_or(""),
        item.start_line,
        item.end_line,
        item.r#type
    ))
}

/// Builds the marker for a specific `ReviewItem` directly.
pub fn build_marker_for_item(item: &ReviewItem) -> String {
    format!("<!-- {MARKER_TAG}; key={} -->", item_key(item))
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<!--\s*powered by seele-review;\s*key=([0-9a-f]+)\s*-->").expect("valid regex")
    })
}

/// Extracts the marker's key from a comment body, if present.
pub fn extract_key(body: &str) -> Option<String> {
    marker_regex()
        .captures(body)
        .map(|c| c[1].to_string())
}

fn hex_sha256(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_round_trips_through_key_extraction() {
        let marker = build_marker("foo.py:42:42:new");
        let body = format!("some rendered review\n\n{marker}\n");
        assert_eq!(extract_key(&body), Some(hex_sha256("foo.py:42:42:new")));
    }

    #[test]
    fn marker_appears_exactly_once() {
        let marker = build_marker("k");
        let body = format!("header\n{marker}\nfooter");
        assert_eq!(body.matches(MARKER_TAG).count(), 1);
    }

    #[test]
    fn no_marker_returns_none() {
        assert_eq!(extract_key("just a plain comment"), None);
    }
}
