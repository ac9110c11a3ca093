//! Media allow-list classification, deterministic destination naming, and the
//! linear retry delay curve.

use chanvault_core::feed::{MediaKind, RawMessage};
use chanvault_core::media_fetch::{MediaAllowList, MediaFetcher};
use chanvault_core::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

fn msg(id: i64, date_ms: i64) -> RawMessage {
    RawMessage {
        id,
        date_ms,
        text: None,
        media: None,
        grouped_id: None,
    }
}

// ---------------------------------------------------------------------------
// Allow-list classification
// ---------------------------------------------------------------------------

#[test]
fn allow_list_parses_category_names_and_aliases() {
    let allow = MediaAllowList::from_names(&["photo", "VIDEO", " file "]);
    assert!(allow.photo);
    assert!(allow.video);
    assert!(allow.document);

    let aliases = MediaAllowList::from_names(&["image"]);
    assert!(aliases.photo);
    assert!(!aliases.video);

    let unknown = MediaAllowList::from_names(&["hologram"]);
    assert_eq!(unknown, MediaAllowList::default());
}

#[test]
fn specific_kinds_require_their_own_category() {
    let photos_only = MediaAllowList::from_names(&["photo"]);
    assert!(photos_only.permits(MediaKind::Photo));
    assert!(!photos_only.permits(MediaKind::Video));
    assert!(!photos_only.permits(MediaKind::Document));
}

#[test]
fn document_category_never_captures_specific_kinds() {
    // Voice notes, audio and stickers must not ride in on the generic
    // document category.
    let docs = MediaAllowList::from_names(&["document"]);
    assert!(docs.permits(MediaKind::Document));
    assert!(!docs.permits(MediaKind::Voice));
    assert!(!docs.permits(MediaKind::Audio));
    assert!(!docs.permits(MediaKind::Sticker));
    assert!(!docs.permits(MediaKind::Photo));
}

#[test]
fn empty_allow_list_permits_nothing() {
    let none = MediaAllowList::default();
    for kind in [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Voice,
        MediaKind::Audio,
        MediaKind::Sticker,
        MediaKind::Document,
    ] {
        assert!(!none.permits(kind));
    }
}

// ---------------------------------------------------------------------------
// Deterministic destination naming
// ---------------------------------------------------------------------------

#[test]
fn media_prefix_derives_from_date_and_id() {
    // 2024-01-15T00:00:00Z
    let message = msg(42, 1_705_276_800_000);
    let prefix = MediaFetcher::media_prefix("news", &message);
    assert_eq!(prefix, PathBuf::from("downloads/news/20240115_42"));
}

#[test]
fn media_prefix_is_stable_across_calls() {
    let message = msg(7, 1_705_276_800_500);
    assert_eq!(
        MediaFetcher::media_prefix("news", &message),
        MediaFetcher::media_prefix("news", &message)
    );
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[test]
fn retry_delay_grows_linearly() {
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(2),
    };
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    assert_eq!(policy.delay_for(3), Duration::from_secs(6));
}

#[test]
fn retry_delay_treats_attempt_zero_as_one() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for(0), policy.delay_for(1));
}
