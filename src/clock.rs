//! Reference time zone and timestamp conversion.
//!
//! All "now", day and minute-of-day comparisons use one fixed zone,
//! Asia/Bangkok (UTC+07:00, no DST), whatever the host locale is.
//! Timestamps cross the HTTP boundary as ISO-8601 strings.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};

use crate::model::Ms;

pub const MINUTE: Ms = 60_000;
pub const HOUR: Ms = 60 * MINUTE;
pub const DAY: Ms = 24 * HOUR;

pub const REFERENCE_OFFSET_SECS: i32 = 7 * 3600;
const REFERENCE_OFFSET_MS: Ms = REFERENCE_OFFSET_SECS as Ms * 1000;

pub fn reference_offset() -> FixedOffset {
    FixedOffset::east_opt(REFERENCE_OFFSET_SECS).expect("reference offset within ±24h")
}

pub fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

/// Parse an ISO-8601 timestamp. Strings with an offset or `Z` are taken as-is;
/// naive `YYYY-MM-DDTHH:MM[:SS]` form input is read in the reference zone.
pub fn parse_timestamp(s: &str) -> Option<Ms> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis() - REFERENCE_OFFSET_MS)
}

/// UTC wire format with millisecond precision, e.g. `2024-01-01T02:00:00.000Z`.
pub fn to_iso(ms: Ms) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Human-readable time in the reference zone, e.g. `2024-01-01 09:00`.
pub fn to_local_string(ms: Ms) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt
            .with_timezone(&reference_offset())
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => format!("@{ms}"),
    }
}

/// Start (00:00 reference zone) of the day containing `ms`.
pub fn day_start(ms: Ms) -> Ms {
    (ms + REFERENCE_OFFSET_MS).div_euclid(DAY) * DAY - REFERENCE_OFFSET_MS
}

/// Minutes since reference-zone midnight.
pub fn minute_of_day(ms: Ms) -> u32 {
    ((ms + REFERENCE_OFFSET_MS).rem_euclid(DAY) / MINUTE) as u32
}

/// Build a timestamp from a reference-zone wall clock.
pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Ms> {
    let naive = chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(naive.and_utc().timestamp_millis() - REFERENCE_OFFSET_MS)
}
