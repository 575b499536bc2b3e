//! Note timestamp formatting and parsing.
//!
//! Caller-supplied timestamps are stored verbatim. Parsing is only used to
//! derive an ordering instant, so unparseable strings are not an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Default note timestamp format (`YYYYMMDDHHMM`).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

const NAIVE_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y%m%d%H%M%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Render an instant in the default note timestamp format.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Best-effort parse of a note timestamp string into a UTC instant.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
