//! Daily reset of task completion flags.
//!
//! Two paths reach the reset: the startup check and a timer that fires at
//! every local midnight. Both go through [`run_daily_reset`], which is
//! guarded by the `lastResetDate` marker in the local cache, so whichever
//! runs second on a given day does nothing. Historical completion counts
//! are never touched; only the `completed` flags are cleared.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::LocalCache;
use crate::day::{until_next_midnight, Clock};
use crate::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResetOutcome {
    /// The marker already names today, or the ledger already holds a count
    /// for today.
    AlreadyDone,
    /// Flags were cleared and the marker moved to today.
    Reset { cleared: usize },
}

impl ResetOutcome {
    pub fn did_reset(self) -> bool {
        matches!(self, ResetOutcome::Reset { .. })
    }
}

/// Clear completion flags unless `last_reset` is already `today`.
///
/// A ledger that already records a count for today had its flags set today,
/// after some reset ran (possibly in another session or on another device),
/// so it is left alone even when the local marker is stale or missing.
///
/// Returns the number of tasks whose flag was cleared, or `None` when the
/// reset already ran today.
pub fn apply_reset(ledger: &mut Ledger, last_reset: Option<NaiveDate>, today: NaiveDate) -> Option<usize> {
    if last_reset == Some(today) || ledger.has_count_for(today) {
        return None;
    }
    Some(ledger.clear_completion())
}

/// Marker-guarded reset that persists its result to the cache.
pub fn run_daily_reset(
    ledger: &mut Ledger,
    cache: &LocalCache,
    session_key: &str,
    today: NaiveDate,
) -> ResetOutcome {
    let last_reset = cache.last_reset_date(session_key);
    match apply_reset(ledger, last_reset, today) {
        None => {
            if last_reset != Some(today) {
                cache.save_last_reset_date(session_key, today);
                debug!(session = session_key, %today, ?last_reset, "ledger already current for today; marker moved");
            } else {
                debug!(session = session_key, %today, "daily reset already applied");
            }
            ResetOutcome::AlreadyDone
        }
        Some(cleared) => {
            cache.save(session_key, ledger);
            cache.save_last_reset_date(session_key, today);
            info!(session = session_key, %today, cleared, ?last_reset, "daily reset applied");
            ResetOutcome::Reset { cleared }
        }
    }
}

/// Self-rearming midnight timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct ResetScheduler {
    handle: JoinHandle<()>,
}

impl ResetScheduler {
    /// Spawn the timer on the current tokio runtime. `on_midnight` receives
    /// the local date observed after each wake-up.
    pub fn spawn<F>(clock: Arc<dyn Clock>, on_midnight: F) -> Self
    where
        F: Fn(NaiveDate) + Send + Sync + 'static,
    {
        let first_wait = until_next_midnight(clock.now());
        debug!(wait_secs = first_wait.as_secs(), "reset timer armed");
        let handle = tokio::spawn(async move {
            let mut wait = first_wait;
            loop {
                tokio::time::sleep(wait).await;
                let today = clock.today();
                debug!(%today, "reset timer fired");
                on_midnight(today);
                wait = until_next_midnight(clock.now());
            }
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ResetScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::{local_at, parse_day, FixedClock};
    use crate::storage::Storage;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn day(raw: &str) -> NaiveDate {
        parse_day(raw).unwrap()
    }

    fn ledger_with_done_task(today: NaiveDate) -> Ledger {
        let mut ledger = Ledger::new();
        let task = ledger.add_task("meditate", local_at(today, 7)).unwrap();
        ledger.toggle_task(task.id, today).unwrap();
        ledger
    }

    #[test]
    fn reset_clears_flags_but_keeps_counts() {
        let yesterday = day("2024-03-09");
        let today = day("2024-03-10");
        let mut ledger = ledger_with_done_task(yesterday);

        assert_eq!(apply_reset(&mut ledger, Some(yesterday), today), Some(1));
        assert!(ledger.tasks().iter().all(|task| !task.completed));
        assert_eq!(ledger.completed_on(yesterday), 1);
        assert_eq!(ledger.completed_on(today), 0);
    }

    #[test]
    fn second_reset_same_day_is_noop() {
        let today = day("2024-03-10");
        let temp = TempDir::new().unwrap();
        let cache = LocalCache::new(Storage::new(temp.path().to_path_buf()));
        let mut ledger = ledger_with_done_task(day("2024-03-09"));

        let first = run_daily_reset(&mut ledger, &cache, "u1", today);
        assert_eq!(first, ResetOutcome::Reset { cleared: 1 });
        assert_eq!(cache.last_reset_date("u1"), Some(today));

        // A task completed after the reset must survive a second firing.
        let id = ledger.tasks()[0].id;
        ledger.toggle_task(id, today).unwrap();
        let snapshot = ledger.clone();
        assert_eq!(run_daily_reset(&mut ledger, &cache, "u1", today), ResetOutcome::AlreadyDone);
        assert_eq!(ledger, snapshot);
    }

    #[test]
    fn count_recorded_today_skips_reset_and_stamps_marker() {
        let today = day("2024-03-10");
        let temp = TempDir::new().unwrap();
        let cache = LocalCache::new(Storage::new(temp.path().to_path_buf()));
        let mut ledger = ledger_with_done_task(today);
        let snapshot = ledger.clone();

        assert_eq!(run_daily_reset(&mut ledger, &cache, "u1", today), ResetOutcome::AlreadyDone);
        assert_eq!(ledger, snapshot);
        assert_eq!(ledger.completed_on(today), ledger.completed_now());
        assert_eq!(cache.last_reset_date("u1"), Some(today));
    }

    #[test]
    fn missing_marker_triggers_reset() {
        let today = day("2024-03-10");
        let mut ledger = Ledger::new();
        assert_eq!(apply_reset(&mut ledger, None, today), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_at_midnight_and_rearms() {
        let clock = Arc::new(FixedClock::new(
            local_at(day("2024-03-09"), 23) + chrono::Duration::minutes(59),
        ));
        let fired = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&fired);
        let scheduler = ResetScheduler::spawn(clock.clone(), move |today| {
            seen.lock().unwrap().push(today);
        });

        clock.set(local_at(day("2024-03-10"), 0) + chrono::Duration::seconds(1));
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(*fired.lock().unwrap(), vec![day("2024-03-10")]);
        assert!(!scheduler.is_finished());
        scheduler.cancel();
    }
}
