use chrono::{DateTime, Duration, SecondsFormat, Utc};

use shared_utils::ClinicCalendar;

use crate::models::ScanStrategy;

/// Local hour at which the once-a-day batch scan replaces the rolling
/// window.
pub const BATCH_LOCAL_HOUR: u32 = 18;

/// Picks the scan strategy and its UTC bounds for a single run.
///
/// At 18:00 clinic-local the run covers all of local tomorrow; at any
/// other hour it covers appointments starting `hours_before` hours out,
/// give or take one hour, so consecutive hourly runs overlap rather
/// than leave gaps.
pub fn scan_window(
    now_utc: DateTime<Utc>,
    calendar: &ClinicCalendar,
    hours_before: i64,
) -> (ScanStrategy, DateTime<Utc>, DateTime<Utc>) {
    if calendar.local_hour(now_utc) == BATCH_LOCAL_HOUR {
        let (start, end) = calendar.tomorrow_bounds_utc(now_utc);
        (ScanStrategy::Batch, start, end)
    } else {
        let target = now_utc + Duration::hours(hours_before);
        (
            ScanStrategy::Rolling,
            target - Duration::hours(1),
            target + Duration::hours(1),
        )
    }
}

/// PostgREST filter for candidate appointments inside the window.
pub fn candidate_query(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "starts_at=gte.{}&starts_at=lt.{}&status=in.(scheduled,confirmed,pending)&order=starts_at.asc",
        start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}
