use chrono::{Local, NaiveDate, Utc};

/// Source of "today" for everything that depends on the calendar. Core logic never reads the
/// system clock directly so it can be driven from tests.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    /// Wall-clock milliseconds since the Unix epoch, used to mint habit ids.
    fn now_millis(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
    }
}

/// Local calendar date of the machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same date. Its instant is midnight UTC of that date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }

    fn now_millis(&self) -> u64 {
        let midnight = self.0.and_hms_opt(0, 0, 0).unwrap_or_default();
        u64::try_from(midnight.and_utc().timestamp_millis()).unwrap_or_default()
    }
}
