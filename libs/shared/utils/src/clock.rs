use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

/// Source of "now". Campaign window math is injected with a clock so the
/// hour arithmetic can be tested against fixed instants.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test double pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Clinic-local calendar math over an IANA timezone.
#[derive(Debug, Clone, Copy)]
pub struct ClinicCalendar {
    pub tz: Tz,
}

impl ClinicCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn local_now(&self, now_utc: DateTime<Utc>) -> DateTime<Tz> {
        now_utc.with_timezone(&self.tz)
    }

    /// Clinic-local hour of day (0..=23) at the given instant.
    pub fn local_hour(&self, now_utc: DateTime<Utc>) -> u32 {
        use chrono::Timelike;
        self.local_now(now_utc).hour()
    }

    /// UTC instants covering clinic-local "tomorrow": [00:00 tomorrow,
    /// 00:00 day after). Handles DST transitions via the tz database.
    pub fn tomorrow_bounds_utc(&self, now_utc: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_today = self.local_now(now_utc).date_naive();
        let tomorrow = local_today + Duration::days(1);
        let day_after = local_today + Duration::days(2);

        let start = self
            .tz
            .from_local_datetime(&tomorrow.and_hms_opt(0, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        let end = self
            .tz
            .from_local_datetime(&day_after.and_hms_opt(0, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc);

        (start, end)
    }
}
