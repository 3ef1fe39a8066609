use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// `%#z` takes `+09:00`, `+0900` and `+09`
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

/// Hour-only times; chrono needs a minute, so `:00` is appended first
const HOUR_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y%m%dT%H:%M"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Parse an ISO8601-like timestamp leniently.
///
/// Offsets are normalized to UTC; naive timestamps are taken as-is.
/// Returns `None` for anything unparsable, which orders before every
/// parsed instant (`None < Some(_)`), so bad timestamps sort as oldest.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let ts = raw.trim();
    if ts.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(ts, format).ok())
    {
        return Some(dt.naive_utc());
    }

    let ts = ts.trim_end_matches(['Z', 'z']);
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(ts, format).ok())
        .or_else(|| {
            let padded = format!("{ts}:00");
            HOUR_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(&padded, format).ok())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(ts, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
