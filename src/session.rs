//! Signed-in session context.
//!
//! A [`Session`] owns everything that lives between sign-in and sign-out:
//! the ledger, the cache handle, the synchronizer and the midnight timer.
//! Nothing here is global; a new identity means a new `Session`.
//!
//! Every mutation follows the same sequence under the ledger lock: apply
//! to the ledger, save the cache, queue the full document for
//! write-through, then recompute the derived view (streak and calendar)
//! from the updated ledger.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::LocalCache;
use crate::calendar::{self, CalendarGrid};
use crate::config::Config;
use crate::day::Clock;
use crate::error::Result;
use crate::identity::{Identity, IdentityProvider};
use crate::ledger::{JournalEntry, Ledger, Task, TaskId};
use crate::remote::{RemoteDocument, RemoteStore};
use crate::reset::{run_daily_reset, ResetOutcome, ResetScheduler};
use crate::streak;
use crate::sync::{Reconciliation, SyncState, Synchronizer};

/// Tunables for derived values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub window_days: u32,
    pub history_days: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            window_days: config.streak.window_days,
            history_days: config.calendar.history_days,
        }
    }
}

/// Collaborators a session is built from.
#[derive(Clone)]
pub struct SessionContext {
    pub cache: LocalCache,
    pub remote: Arc<dyn RemoteStore>,
    pub clock: Arc<dyn Clock>,
    pub settings: SessionSettings,
}

/// Derived state, recomputed after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub today: NaiveDate,
    pub tasks: Vec<Task>,
    pub completed_today: u32,
    pub streak: u32,
    #[serde(skip)]
    pub calendar: CalendarGrid,
}

/// Result of a mutation together with the recomputed view.
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub value: T,
    pub view: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub user_id: String,
    pub username: String,
    pub sync_state: SyncState,
    pub tasks: usize,
    pub completed_today: u32,
    pub streak: u32,
    pub journal_today: usize,
    pub last_reset_date: Option<NaiveDate>,
    pub last_access_date: Option<NaiveDate>,
}

struct SessionInner {
    identity: Identity,
    username: Mutex<String>,
    ledger: Mutex<Ledger>,
    cache: LocalCache,
    clock: Arc<dyn Clock>,
    sync: Synchronizer,
    settings: SessionSettings,
}

impl SessionInner {
    fn key(&self) -> &str {
        self.identity.session_key()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn username(&self) -> String {
        self.username
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Queue `ledger` for write-through; records the access date when the
    /// write was accepted.
    fn write_through(&self, ledger: &Ledger, today: NaiveDate) -> bool {
        let pushed = self
            .sync
            .push(RemoteDocument::from_ledger(ledger, &self.username()));
        if pushed {
            self.cache.save_last_access_date(self.key(), today);
        }
        pushed
    }

    fn daily_reset(&self, today: NaiveDate) -> ResetOutcome {
        let mut ledger = self.ledger();
        let outcome = run_daily_reset(&mut ledger, &self.cache, self.key(), today);
        if outcome.did_reset() {
            self.write_through(&ledger, today);
        }
        outcome
    }

    fn view_of(&self, ledger: &Ledger, today: NaiveDate) -> SessionView {
        SessionView {
            today,
            tasks: ledger.tasks().to_vec(),
            completed_today: ledger.completed_on(today),
            streak: streak::streak(ledger.completed_tasks(), today, self.settings.window_days),
            calendar: calendar::aggregate(ledger.completed_tasks(), today, self.settings.history_days),
        }
    }
}

pub struct Session {
    inner: Arc<SessionInner>,
    reconciliation: Reconciliation,
    startup_reset: ResetOutcome,
    reset: Option<ResetScheduler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.inner.identity.user_id)
            .field("sync", &self.inner.sync)
            .field("startup_reset", &self.startup_reset)
            .finish()
    }
}

impl Session {
    /// Start a session for `identity`: load the cache, reconcile with the
    /// remote store, run the startup reset check and arm the midnight timer.
    ///
    /// Never fails; an unreachable remote leaves the session working on the
    /// cached state with write-through off.
    pub async fn sign_in(identity: Identity, context: SessionContext) -> Self {
        let SessionContext {
            cache,
            remote,
            clock,
            settings,
        } = context;
        let key = identity.session_key().to_string();

        let cached = cache.load(&key);
        let mut username = identity
            .display_name
            .clone()
            .unwrap_or_else(|| cached.username.clone());
        let mut ledger = cached.ledger();
        debug!(user = %key, tasks = ledger.tasks().len(), "loaded local cache");

        let sync = Synchronizer::new(remote);
        let reconciliation = sync.reconcile(&key, &ledger, &username).await;
        let mut rename_pending = false;
        if let Reconciliation::AdoptedRemote(document) = &reconciliation {
            ledger = document.ledger();
            cache.save(&key, &ledger);
            match &identity.display_name {
                Some(name) => rename_pending = *name != document.username,
                None => username = document.username.clone(),
            }
        }
        cache.save_username(&key, &username);

        let inner = Arc::new(SessionInner {
            identity,
            username: Mutex::new(username),
            ledger: Mutex::new(ledger),
            cache,
            clock: Arc::clone(&clock),
            sync,
            settings,
        });

        let today = clock.today();
        let startup_reset = inner.daily_reset(today);
        if rename_pending && !startup_reset.did_reset() {
            let ledger = inner.ledger();
            inner.write_through(&ledger, today);
        }

        let weak = Arc::downgrade(&inner);
        let reset = ResetScheduler::spawn(clock, move |today| {
            if let Some(inner) = weak.upgrade() {
                inner.daily_reset(today);
            }
        });

        info!(user = %key, state = ?inner.sync.state(), "session started");
        Self {
            inner,
            reconciliation,
            startup_reset,
            reset: Some(reset),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn username(&self) -> String {
        self.inner.username()
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.sync.state()
    }

    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }

    pub fn startup_reset(&self) -> ResetOutcome {
        self.startup_reset
    }

    pub fn today(&self) -> NaiveDate {
        self.inner.clock.today()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn add_task(&self, text: &str) -> Result<Applied<Task>> {
        self.apply(|ledger, now| ledger.add_task(text, now))
    }

    pub fn toggle_task(&self, id: TaskId) -> Result<Applied<Task>> {
        self.apply(|ledger, now| ledger.toggle_task(id, now.date_naive()))
    }

    pub fn delete_task(&self, id: TaskId) -> Result<Applied<Task>> {
        self.apply(|ledger, now| ledger.delete_task(id, now.date_naive()))
    }

    pub fn add_journal_entry(&self, text: &str) -> Result<Applied<JournalEntry>> {
        self.apply(|ledger, now| ledger.add_journal_entry(text, now))
    }

    /// Run the marker-guarded reset for today, as the midnight timer would.
    pub fn run_daily_reset(&self) -> ResetOutcome {
        self.inner.daily_reset(self.today())
    }

    fn apply<T>(&self, op: impl FnOnce(&mut Ledger, DateTime<Local>) -> Result<T>) -> Result<Applied<T>> {
        let now = self.inner.clock.now();
        let today = now.date_naive();
        let mut ledger = self.inner.ledger();
        let value = op(&mut ledger, now)?;
        self.inner.cache.save(self.inner.key(), &ledger);
        self.inner.write_through(&ledger, today);
        let view = self.inner.view_of(&ledger, today);
        Ok(Applied { value, view })
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn view(&self) -> SessionView {
        let ledger = self.inner.ledger();
        self.inner.view_of(&ledger, self.today())
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.ledger().tasks().to_vec()
    }

    pub fn ledger(&self) -> Ledger {
        self.inner.ledger().clone()
    }

    pub fn streak(&self) -> u32 {
        self.view().streak
    }

    pub fn calendar(&self) -> CalendarGrid {
        self.view().calendar
    }

    pub fn journal_for(&self, date: NaiveDate) -> Vec<JournalEntry> {
        self.inner.ledger().journal_for(date).to_vec()
    }

    pub fn status(&self) -> Status {
        let today = self.today();
        let ledger = self.inner.ledger();
        let key = self.inner.key();
        Status {
            user_id: self.inner.identity.user_id.clone(),
            username: self.inner.username(),
            sync_state: self.inner.sync.state(),
            tasks: ledger.tasks().len(),
            completed_today: ledger.completed_on(today),
            streak: streak::streak(ledger.completed_tasks(), today, self.inner.settings.window_days),
            journal_today: ledger.journal_for(today).len(),
            last_reset_date: self.inner.cache.last_reset_date(key),
            last_access_date: self.inner.cache.last_access_date(key),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Wait for queued write-through to be attempted.
    pub async fn flush(&self) {
        self.inner.sync.flush().await;
    }

    /// Flush pending writes and stop background work, keeping the identity
    /// and the cache.
    pub async fn close(mut self) {
        self.inner.sync.flush().await;
        self.stop_timer();
        self.inner.sync.teardown();
        debug!(user = %self.inner.key(), "session closed");
    }

    /// Sign out: cancel the timer, drop pending writes, stamp the remote
    /// last-access date, wipe the cache and the ledger, then sign the
    /// identity out.
    pub async fn sign_out(mut self, provider: &dyn IdentityProvider) -> Result<()> {
        self.stop_timer();
        let today = self.today();
        self.inner.sync.sign_out(today).await;
        self.inner.cache.clear(self.inner.key());
        *self.inner.ledger() = Ledger::new();
        provider.sign_out()?;
        info!(user = %self.inner.key(), "signed out");
        Ok(())
    }

    fn stop_timer(&mut self) {
        if let Some(reset) = self.reset.take() {
            reset.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::{local_at, parse_day, FixedClock};
    use crate::remote::MemoryRemoteStore;
    use crate::storage::Storage;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        cache: LocalCache,
        store: MemoryRemoteStore,
        clock: Arc<FixedClock>,
    }

    impl Fixture {
        fn new(today: &str) -> Self {
            let temp = TempDir::new().unwrap();
            let cache = LocalCache::new(Storage::new(temp.path().to_path_buf()));
            Self {
                _temp: temp,
                cache,
                store: MemoryRemoteStore::new(),
                clock: Arc::new(FixedClock::at_noon(parse_day(today).unwrap())),
            }
        }

        fn context(&self) -> SessionContext {
            SessionContext {
                cache: self.cache.clone(),
                remote: Arc::new(self.store.clone()),
                clock: self.clock.clone(),
                settings: SessionSettings::default(),
            }
        }

        async fn sign_in(&self, name: Option<&str>) -> Session {
            Session::sign_in(Identity::new("u1", name).unwrap(), self.context()).await
        }
    }

    #[tokio::test]
    async fn read_ten_pages_scenario() {
        let fx = Fixture::new("2024-01-03");
        let session = fx.sign_in(None).await;

        let added = session.add_task("Read 10 pages").unwrap();
        assert_eq!(added.view.tasks.len(), 1);
        assert!(!added.value.completed);

        let on = session.toggle_task(added.value.id).unwrap();
        assert_eq!(on.view.completed_today, 1);
        assert_eq!(on.view.streak, 1);

        let off = session.toggle_task(added.value.id).unwrap();
        assert_eq!(off.view.completed_today, 0);
        assert_eq!(off.view.streak, 0);
    }

    #[tokio::test]
    async fn rejected_mutations_change_nothing() {
        let fx = Fixture::new("2024-01-03");
        let session = fx.sign_in(None).await;
        session.flush().await;
        let writes = fx.store.write_count();

        assert!(session.add_task("   ").is_err());
        assert!(session.toggle_task(42).is_err());
        assert!(session.delete_task(42).is_err());
        assert!(session.add_journal_entry("").is_err());

        session.flush().await;
        assert_eq!(fx.store.write_count(), writes);
        assert!(session.tasks().is_empty());
    }

    #[tokio::test]
    async fn mutations_reach_cache_and_remote() {
        let fx = Fixture::new("2024-01-03");
        let session = fx.sign_in(Some("Ada")).await;
        session.add_task("stretch").unwrap();
        session.add_journal_entry("slept well").unwrap();
        session.flush().await;

        let today = session.today();
        let cached = fx.cache.load("u1");
        assert_eq!(cached.tasks, session.tasks());
        assert_eq!(cached.last_access_date, Some(today));
        let remote = fx.store.document("u1").unwrap();
        assert_eq!(remote.tasks, session.tasks());
        assert_eq!(remote.journal_entries[&today].len(), 1);
        assert_eq!(remote.username, "Ada");
    }

    #[tokio::test]
    async fn timer_resets_flags_after_midnight() {
        let fx = Fixture::new("2024-01-03");
        let session = fx.sign_in(None).await;
        let task = session.add_task("walk").unwrap().value;
        session.toggle_task(task.id).unwrap();

        fx.clock.set(local_at(parse_day("2024-01-04").unwrap(), 0));
        assert!(session.run_daily_reset().did_reset());
        assert!(!session.run_daily_reset().did_reset());

        let view = session.view();
        assert!(view.tasks.iter().all(|task| !task.completed));
        assert_eq!(view.completed_today, 0);
        let ledger = session.ledger();
        assert_eq!(ledger.completed_on(parse_day("2024-01-03").unwrap()), 1);
    }

    #[tokio::test]
    async fn sign_out_clears_local_state() {
        let fx = Fixture::new("2024-01-03");
        let provider = crate::identity::MemoryIdentityProvider::signed_in(
            Identity::new("u1", None).unwrap(),
        );
        let session = fx.sign_in(None).await;
        session.add_task("walk").unwrap();
        session.sign_out(&provider).await.unwrap();

        let cached = fx.cache.load("u1");
        assert!(cached.ledger().is_empty());
        assert!(cached.username.is_empty());
        assert_eq!(cached.last_reset_date, Some(parse_day("2024-01-03").unwrap()));
        assert!(provider.current().unwrap().is_none());
        let remote = fx.store.document("u1").unwrap();
        assert_eq!(remote.last_access, Some(parse_day("2024-01-03").unwrap()));
    }
}
