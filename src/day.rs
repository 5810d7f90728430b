//! Calendar-day helpers in the local timezone.
//!
//! Every date the ledger keys on is a local `NaiveDate`, rendered as
//! `YYYY-MM-DD`. Time is read through [`Clock`] so sessions, the reset
//! scheduler and tests agree on what "today" is.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::{Error, Result};

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Source of the current local time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock pinned to 12:00 local time on `date`.
    pub fn at_noon(date: NaiveDate) -> Self {
        Self::new(local_at(date, 12))
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Format a date as `YYYY-MM-DD`.
pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_day(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, DAY_FORMAT).map_err(|err| {
        Error::InvalidArgument(format!("invalid date '{trimmed}' (expected YYYY-MM-DD): {err}"))
    })
}

/// First instant of the day after `now`.
pub fn next_midnight(now: DateTime<Local>) -> DateTime<Local> {
    let today = now.date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    // Some zones skip 00:00 on DST change; the first existing hour counts.
    (0..3)
        .find_map(|hour| resolve_local(tomorrow, hour))
        .unwrap_or_else(|| now + Duration::hours(24))
}

/// Time left until [`next_midnight`].
pub fn until_next_midnight(now: DateTime<Local>) -> std::time::Duration {
    (next_midnight(now) - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

/// Local datetime at `hour`:00 on `date`, falling back to UTC for
/// nonexistent local times.
pub fn local_at(date: NaiveDate, hour: u32) -> DateTime<Local> {
    resolve_local(date, hour).unwrap_or_else(|| {
        let naive = naive_at(date, hour);
        Local.from_utc_datetime(&naive)
    })
}

fn resolve_local(date: NaiveDate, hour: u32) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&naive_at(date, hour)).earliest()
}

fn naive_at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour.min(23), 0, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN))
}
