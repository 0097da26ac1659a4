//! EPG (Electronic Program Guide) module
//!
//! Parsing of the `epg` response, merging into the shared snapshot, window
//! planning and the time helpers. The service speaks Europe/Prague local
//! time, every conversion goes through it.

mod merge;
mod parser;
mod window;

pub use merge::{merge_entries, release_outside, EpgChange};
pub use parser::parse_epg_response;
pub use window::{EpgLoad, EpgLoadState, DAY, HOUR};

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Europe::Prague;

/// Resolve a Prague wall-clock time to a Unix timestamp. Times falling into
/// the spring DST gap are moved one hour forward.
fn prague_timestamp(naive: NaiveDateTime) -> Option<i64> {
    Prague
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Prague.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.timestamp())
}

/// Parse `YYYY-MM-DD HH:MM` (Prague time) as used by the API
pub fn parse_datetime(s: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M").ok()?;
    prague_timestamp(naive)
}

/// Parse the date part of `s` and return Prague midnight of that day
pub fn parse_date_midnight(s: &str) -> Option<i64> {
    let date = s.trim().get(..10)?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    prague_timestamp(date.and_hms_opt(0, 0, 0)?)
}

/// Format a Unix timestamp the way the `epg` call expects it
pub fn format_api_time(ts: i64) -> String {
    match Prague.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => String::new(),
    }
}

/// Format a Unix timestamp as Prague datetime for logs
pub fn format_datetime(ts: i64) -> String {
    match Prague.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        None => ts.to_string(),
    }
}

/// Start of the Prague day containing `ts`
pub fn prague_day_start(ts: i64) -> i64 {
    Prague
        .timestamp_opt(ts, 0)
        .single()
        .and_then(|dt| dt.date_naive().and_hms_opt(0, 0, 0))
        .and_then(prague_timestamp)
        .unwrap_or(ts - ts.rem_euclid(DAY))
}
