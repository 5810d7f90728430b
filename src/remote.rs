//! Remote store boundary.
//!
//! The remote store keeps one authoritative document per user identity.
//! Transport is not this crate's concern: the synchronizer talks to any
//! [`RemoteStore`]. Two stores ship with the crate: a file-backed store (one
//! JSON document per user under a directory, usable as a shared drive or a
//! synced folder) and an in-memory store with fault injection for tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::{CompletedCount, JournalEntries, Ledger, Task};
use crate::lock::{lock_path_for, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::{sanitize_key, Storage};

/// The per-user document as stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub completed_tasks: CompletedCount,
    #[serde(default)]
    pub journal_entries: JournalEntries,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<NaiveDate>,
}

impl RemoteDocument {
    pub fn from_ledger(ledger: &Ledger, username: &str) -> Self {
        Self {
            tasks: ledger.tasks().to_vec(),
            completed_tasks: ledger.completed_tasks().clone(),
            journal_entries: ledger.journal_entries().clone(),
            username: username.to_string(),
            last_access: None,
        }
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::from_parts(
            self.tasks.clone(),
            self.completed_tasks.clone(),
            self.journal_entries.clone(),
        )
    }

    /// Overlay the fields a write-through carries, keeping remote-only ones.
    fn merged_into(&self, existing: RemoteDocument) -> RemoteDocument {
        RemoteDocument {
            last_access: self.last_access.or(existing.last_access),
            ..self.clone()
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetch the document for `user`, `None` if it was never created.
    async fn fetch(&self, user: &str) -> Result<Option<RemoteDocument>>;

    /// Create or overwrite the document for `user`.
    async fn create(&self, user: &str, document: &RemoteDocument) -> Result<()>;

    /// Overwrite the synced fields of an existing document. Fails when the
    /// document does not exist.
    async fn update(&self, user: &str, document: &RemoteDocument) -> Result<()>;

    /// Record the date of the user's last sign-out.
    async fn touch_last_access(&self, user: &str, date: NaiveDate) -> Result<()>;
}

fn missing(user: &str) -> Error {
    Error::RemoteUnavailable(format!("no remote document for user {user}"))
}

// =============================================================================
// File-backed store
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileRemoteStore {
    storage: Storage,
    lock_timeout_ms: u64,
}

impl FileRemoteStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            storage: Storage::new(dir),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn document_path(&self, user: &str) -> PathBuf {
        self.storage
            .root()
            .join("users")
            .join(format!("{}.json", sanitize_key(user)))
    }

    /// Run a read-modify-write on one document under its lock, off the
    /// async executor.
    async fn with_document<F, T>(&self, user: &str, op: F) -> Result<T>
    where
        F: FnOnce(&Storage, &std::path::Path, Option<RemoteDocument>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = self.storage.clone();
        let path = self.document_path(user);
        let timeout = self.lock_timeout_ms;
        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(lock_path_for(&path), timeout)?;
            let current = storage.read_json(&path)?;
            op(&storage, &path, current)
        })
        .await
        .map_err(|err| Error::RemoteUnavailable(format!("remote task failed: {err}")))?
        .map_err(|err| match err {
            Error::RemoteUnavailable(_) => err,
            other => Error::RemoteUnavailable(other.to_string()),
        })
    }
}

#[async_trait]
impl RemoteStore for FileRemoteStore {
    async fn fetch(&self, user: &str) -> Result<Option<RemoteDocument>> {
        self.with_document(user, |_, _, current| Ok(current)).await
    }

    async fn create(&self, user: &str, document: &RemoteDocument) -> Result<()> {
        let document = document.clone();
        self.with_document(user, move |storage, path, _| storage.write_json(path, &document))
            .await
    }

    async fn update(&self, user: &str, document: &RemoteDocument) -> Result<()> {
        let document = document.clone();
        let owner = user.to_string();
        self.with_document(user, move |storage, path, current| {
            let existing = current.ok_or_else(|| missing(&owner))?;
            storage.write_json(path, &document.merged_into(existing))
        })
        .await
    }

    async fn touch_last_access(&self, user: &str, date: NaiveDate) -> Result<()> {
        let owner = user.to_string();
        self.with_document(user, move |storage, path, current| {
            let mut existing = current.ok_or_else(|| missing(&owner))?;
            existing.last_access = Some(date);
            storage.write_json(path, &existing)
        })
        .await
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Shared in-memory store. Clones see the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    documents: Mutex<HashMap<String, RemoteDocument>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, user: &str, document: RemoteDocument) -> Self {
        self.insert(user, document);
        self
    }

    /// Seed a document without counting it as a write.
    pub fn insert(&self, user: &str, document: RemoteDocument) {
        self.documents().insert(user.to_string(), document);
    }

    /// Make every call fail with `RemoteUnavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay each write, to hold it in flight.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self
            .inner
            .write_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = delay;
    }

    pub fn document(&self, user: &str) -> Option<RemoteDocument> {
        self.documents().get(user).cloned()
    }

    /// Number of writes that reached the store.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn documents(&self) -> std::sync::MutexGuard<'_, HashMap<String, RemoteDocument>> {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable("remote store offline".to_string()));
        }
        Ok(())
    }

    async fn before_write(&self) -> Result<()> {
        let delay = *self
            .inner
            .write_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, user: &str) -> Result<Option<RemoteDocument>> {
        self.check_available()?;
        Ok(self.document(user))
    }

    async fn create(&self, user: &str, document: &RemoteDocument) -> Result<()> {
        self.before_write().await?;
        self.documents().insert(user.to_string(), document.clone());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, user: &str, document: &RemoteDocument) -> Result<()> {
        self.before_write().await?;
        let mut documents = self.documents();
        let existing = documents.remove(user).ok_or_else(|| missing(user))?;
        documents.insert(user.to_string(), document.merged_into(existing));
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn touch_last_access(&self, user: &str, date: NaiveDate) -> Result<()> {
        self.before_write().await?;
        let mut documents = self.documents();
        let existing = documents.get_mut(user).ok_or_else(|| missing(user))?;
        existing.last_access = Some(date);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
