//! Timestamp parsing for the `added` / `published` columns
//!
//! All timestamps are interpreted in UTC: values with an explicit offset are
//! converted to UTC, naive values are taken as UTC wall-clock time. Calendar
//! years are therefore stable regardless of the server's local timezone.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Format used when storing normalized timestamps
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    // Dataset export format, e.g. "January, 20 2017 03:51:25"
    "%B, %d %Y %H:%M:%S",
    "%B %d %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B, %d %Y", "%B %d %Y"];

/// Parse a timestamp into UTC, or `None` if the value is empty or unrecognized
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.naive_utc());
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Calendar year (UTC) of a timestamp string
pub fn year_of(value: &str) -> Option<i32> {
    parse_timestamp(value).map(|dt| dt.year())
}

/// Re-format a timestamp into `STORAGE_FORMAT`
pub fn normalize(value: &str) -> Option<String> {
    parse_timestamp(value).map(|dt| dt.format(STORAGE_FORMAT).to_string())
}
