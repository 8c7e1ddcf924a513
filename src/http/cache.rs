//! HTTP cache validation module
//!
//! `Last-Modified` generation and `If-Modified-Since` evaluation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Format a modification time as an IMF-fixdate, e.g.
/// `Sun, 18 Oct 2026 10:04:05 GMT`
pub fn last_modified(modified: SystemTime) -> String {
    httpdate::fmt_http_date(modified)
}

/// Decide whether a conditional GET may be answered with 304
///
/// `If-None-Match` takes precedence: when the client sent it the date check
/// is skipped. Sub-second precision of `modified` is dropped before
/// comparing, since HTTP dates carry whole seconds. An unparsable date is
/// ignored.
pub fn is_not_modified(
    if_modified_since: Option<&str>,
    has_if_none_match: bool,
    modified: SystemTime,
) -> bool {
    if has_if_none_match {
        return false;
    }
    let Some(since) = if_modified_since.and_then(|v| httpdate::parse_http_date(v).ok()) else {
        return false;
    };
    truncate_to_secs(modified) <= since
}

fn truncate_to_secs(t: SystemTime) -> SystemTime {
    t.duration_since(UNIX_EPOCH)
        .map_or(t, |d| UNIX_EPOCH + Duration::from_secs(d.as_secs()))
}
