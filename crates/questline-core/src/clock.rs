//! Local-calendar helpers.
//!
//! Challenge resets and streaks follow the device-local calendar day,
//! while record timestamps persist as UTC. Day keys use the
//! `"Wed Aug 06 2026"` form so documents written by older clients keep
//! matching.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Local calendar-day key for an instant, e.g. `"Wed Aug 06 2026"`.
pub fn day_key(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%a %b %d %Y").to_string()
}

/// Day key for the current instant.
pub fn today_key() -> String {
    day_key(Utc::now())
}

/// Local calendar date an instant falls on.
pub fn local_day_floor(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// First instant of the next local calendar day.
///
/// When a DST jump removes local midnight, the earliest existing time of
/// that day is used instead.
pub fn next_local_midnight(after: DateTime<Local>) -> DateTime<Local> {
    let next_day = after.date_naive() + Duration::days(1);
    resolve_local(next_day, NaiveTime::MIN)
        .or_else(|| resolve_local(next_day, NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN)))
        .unwrap_or_else(|| after + Duration::days(1))
}

/// Wall-clock wait from `now` until the next local midnight.
pub fn until_next_local_midnight(now: DateTime<Local>) -> std::time::Duration {
    let midnight = next_local_midnight(now);
    (midnight - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(60))
}

fn resolve_local(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&date.and_time(time)).earliest()
}
