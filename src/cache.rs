//! Local cache: a durable mirror of the ledger, readable before any remote
//! round-trip.
//!
//! Each session key owns a directory holding one file per field, so a
//! single field can be rewritten (the reset marker, the access date)
//! without touching the others. The cache never fails its caller: missing
//! or unreadable fields load as empty and failed writes are logged, since
//! the remote store stays authoritative.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::day::{day_key, parse_day};
use crate::error::Result;
use crate::ledger::{CompletedCount, JournalEntries, Ledger, Task};
use crate::lock::{lock_path_for, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::Storage;

pub const FIELD_TASKS: &str = "tasks";
pub const FIELD_COMPLETED_TASKS: &str = "completedTasks";
pub const FIELD_JOURNAL_ENTRIES: &str = "journalEntries";
pub const FIELD_USERNAME: &str = "username";
pub const FIELD_LAST_ACCESS_DATE: &str = "lastAccessDate";
pub const FIELD_LAST_RESET_DATE: &str = "lastResetDate";

/// Fields removed on sign-out. The reset marker outlives the session so a
/// same-day sign-in does not reset again.
const SESSION_FIELDS: [&str; 5] = [
    FIELD_TASKS,
    FIELD_COMPLETED_TASKS,
    FIELD_JOURNAL_ENTRIES,
    FIELD_USERNAME,
    FIELD_LAST_ACCESS_DATE,
];

/// Everything the cache holds for one session key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedState {
    pub tasks: Vec<Task>,
    pub completed_tasks: CompletedCount,
    pub journal_entries: JournalEntries,
    pub username: String,
    pub last_access_date: Option<NaiveDate>,
    pub last_reset_date: Option<NaiveDate>,
}

impl CachedState {
    pub fn ledger(&self) -> Ledger {
        Ledger::from_parts(
            self.tasks.clone(),
            self.completed_tasks.clone(),
            self.journal_entries.clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    storage: Storage,
    lock_timeout_ms: u64,
}

impl LocalCache {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn field_path(&self, session_key: &str, field: &str) -> PathBuf {
        self.storage.cache_dir(session_key).join(field)
    }

    /// Load the cached state; absent or unreadable data yields the empty state.
    pub fn load(&self, session_key: &str) -> CachedState {
        let _lock = match self.lock(session_key) {
            Ok(lock) => Some(lock),
            Err(err) => {
                warn!(session = session_key, error = %err, "cache lock unavailable; reading unlocked");
                None
            }
        };

        CachedState {
            tasks: self.read_field(session_key, FIELD_TASKS),
            completed_tasks: self.read_field(session_key, FIELD_COMPLETED_TASKS),
            journal_entries: self.read_field(session_key, FIELD_JOURNAL_ENTRIES),
            username: self
                .read_text_field(session_key, FIELD_USERNAME)
                .unwrap_or_default(),
            last_access_date: self.read_date_field(session_key, FIELD_LAST_ACCESS_DATE),
            last_reset_date: self.read_date_field(session_key, FIELD_LAST_RESET_DATE),
        }
    }

    /// Overwrite the ledger snapshot for `session_key`.
    pub fn save(&self, session_key: &str, ledger: &Ledger) {
        if let Err(err) = self.try_save(session_key, ledger) {
            warn!(session = session_key, error = %err, "failed to persist local cache");
        }
    }

    pub fn save_username(&self, session_key: &str, username: &str) {
        self.write_text_field(session_key, FIELD_USERNAME, username);
    }

    pub fn save_last_access_date(&self, session_key: &str, date: NaiveDate) {
        self.write_text_field(session_key, FIELD_LAST_ACCESS_DATE, &day_key(date));
    }

    pub fn last_access_date(&self, session_key: &str) -> Option<NaiveDate> {
        self.read_date_field(session_key, FIELD_LAST_ACCESS_DATE)
    }

    pub fn last_reset_date(&self, session_key: &str) -> Option<NaiveDate> {
        self.read_date_field(session_key, FIELD_LAST_RESET_DATE)
    }

    pub fn save_last_reset_date(&self, session_key: &str, date: NaiveDate) {
        self.write_text_field(session_key, FIELD_LAST_RESET_DATE, &day_key(date));
    }

    /// Wipe the cached ledger, username and access date for `session_key`.
    pub fn clear(&self, session_key: &str) {
        let result = self.lock(session_key).and_then(|_lock| {
            for field in SESSION_FIELDS {
                self.storage
                    .remove_file(&self.field_path(session_key, field))?;
            }
            Ok(())
        });
        match result {
            Ok(()) => debug!(session = session_key, "local cache cleared"),
            Err(err) => warn!(session = session_key, error = %err, "failed to clear local cache"),
        }
    }

    fn try_save(&self, session_key: &str, ledger: &Ledger) -> Result<()> {
        let _lock = self.lock(session_key)?;
        self.storage
            .write_json(&self.field_path(session_key, FIELD_TASKS), &ledger.tasks())?;
        self.storage.write_json(
            &self.field_path(session_key, FIELD_COMPLETED_TASKS),
            ledger.completed_tasks(),
        )?;
        self.storage.write_json(
            &self.field_path(session_key, FIELD_JOURNAL_ENTRIES),
            ledger.journal_entries(),
        )?;
        Ok(())
    }

    fn lock(&self, session_key: &str) -> Result<FileLock> {
        let dir = self.storage.cache_dir(session_key);
        FileLock::acquire(lock_path_for(&dir), self.lock_timeout_ms)
    }

    fn read_field<T: DeserializeOwned + Default>(&self, session_key: &str, field: &str) -> T {
        let path = self.field_path(session_key, field);
        match self.storage.read_json(&path) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                discard_corrupt(&path, field, &err);
                T::default()
            }
        }
    }

    fn read_text_field(&self, session_key: &str, field: &str) -> Option<String> {
        let path = self.field_path(session_key, field);
        self.storage.read_text(&path).unwrap_or_else(|err| {
            discard_corrupt(&path, field, &err);
            None
        })
    }

    fn read_date_field(&self, session_key: &str, field: &str) -> Option<NaiveDate> {
        let raw = self.read_text_field(session_key, field)?;
        parse_day(&raw)
            .map_err(|err| warn!(field, error = %err, "ignoring malformed cached date"))
            .ok()
    }

    fn write_text_field(&self, session_key: &str, field: &str, value: &str) {
        let path = self.field_path(session_key, field);
        if let Err(err) = self.storage.write_text(&path, value) {
            warn!(session = session_key, field, error = %err, "failed to persist cache field");
        }
    }
}

fn discard_corrupt(path: &Path, field: &str, err: &crate::error::Error) {
    warn!(path = %path.display(), field, error = %err, "ignoring unreadable cache field");
}
