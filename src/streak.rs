//! Non-zero day streak.

use chrono::NaiveDate;

use crate::ledger::CompletedCount;

/// Default number of days scanned backwards from today.
pub const DEFAULT_WINDOW_DAYS: u32 = 365;

/// Count consecutive days ending at `today` with at least one completed task.
///
/// Today must itself be non-zero; there is no grace day. The scan stops
/// after `window_days` days.
pub fn streak(completed: &CompletedCount, today: NaiveDate, window_days: u32) -> u32 {
    days_back_from(today)
        .take(window_days as usize)
        .take_while(|date| completed.get(date).is_some_and(|count| *count > 0))
        .count() as u32
}

/// `today`, yesterday, the day before, ...
pub fn days_back_from(today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(today), |date| date.pred_opt())
}
