//! Navigation windowing and URL eligibility.

use std::ops::Range;
use url::Url;

/// Maximum number of navigations synced on each side of the current one.
pub const MAX_SYNC_NAVIGATION_COUNT: usize = 6;

/// Internal browser scheme that is never synced.
const INTERNAL_SCHEME: &str = "chrome";

/// Indices of the navigation entries to serialize for a tab.
///
/// Covers `[max(0, current - N), min(current + N, entry_count))`. A negative
/// `current_index` (no committed entry) is treated as 0.
pub fn navigation_window(current_index: i32, entry_count: usize) -> Range<usize> {
    let current = usize::try_from(current_index.max(0)).unwrap_or(0);
    let start = current.saturating_sub(MAX_SYNC_NAVIGATION_COUNT);
    let end = current
        .saturating_add(MAX_SYNC_NAVIGATION_COUNT)
        .min(entry_count);
    start..end.max(start)
}

/// Whether `url` parses as an absolute URL.
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url).is_ok()
}

/// Whether a navigation to `url` makes a tab worth syncing.
///
/// The URL must parse and must not use the internal or `file` schemes.
pub fn is_syncable_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.scheme() != INTERNAL_SCHEME && parsed.scheme() != "file",
        Err(_) => false,
    }
}

/// Canonical form of `url`, or `None` if it does not parse.
pub fn canonical_url(url: &str) -> Option<String> {
    Url::parse(url).ok().map(String::from)
}
