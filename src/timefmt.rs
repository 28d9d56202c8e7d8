//! Timestamp parsing for feed dates, user input and the run-state value.
//!
//! Feed dates are RFC 3339 (`2019-10-06T00:00:00Z`) but user input and older
//! state values are looser, so parsing tries a short list of layouts. Values
//! without an offset are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const OFFSET_FORMATS: &[&str] = &["%Y%m%dT%H%M%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Parse a timestamp in any of the accepted layouts.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Some(dt) = NaiveDate::parse_from_str(naive, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Some(dt.and_utc());
        }
    }
    None
}

/// Wall-clock reading of a timestamp: an explicit offset is kept as written
/// instead of being shifted to UTC.
fn parse_wall_clock(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_local());
        }
    }
    parse_timestamp(s).map(|dt| dt.naive_utc())
}

/// `YYYYMMDDTHHMMSS` as written in the source date. Both the extended and the
/// basic ISO layouts collapse to the same stamp.
pub fn compact_timestamp(raw: &str) -> Option<String> {
    parse_wall_clock(raw)
        .or_else(|| parse_wall_clock(&raw.replace(['-', ':'], "")))
        .map(|dt| dt.format("%Y%m%dT%H%M%S").to_string())
}

/// Layout of the persisted last-run timestamp (millisecond precision).
pub fn run_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
