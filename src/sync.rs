//! Remote synchronizer.
//!
//! State machine: `Unauthenticated -> Reconciling -> Synced`, back to
//! `Unauthenticated` on sign-out.
//!
//! Reconciliation runs once per sign-in. If the remote document exists it
//! wins outright; otherwise the local state is pushed to create it. Only
//! after that does write-through switch on: a background worker receives
//! full documents and writes the newest one it has, so a burst of mutations
//! collapses into one remote write. Failed writes are logged and dropped;
//! the next mutation carries the full state again.
//!
//! A fetch failure during reconciliation leaves the synchronizer in
//! `Reconciling` with write-through off. Pushing in that state could
//! overwrite an authoritative document this session has never seen.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ledger::Ledger;
use crate::remote::{RemoteDocument, RemoteStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Unauthenticated,
    Reconciling,
    Synced,
}

/// What reconciliation decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The remote document exists; it replaces local state.
    AdoptedRemote(RemoteDocument),
    /// No remote document existed; local state was pushed to create it.
    CreatedRemote,
    /// The remote could not be reached; keep operating on local state.
    Offline,
}

enum WriteCommand {
    Write(RemoteDocument),
    Flush(oneshot::Sender<()>),
}

struct WriteThrough {
    tx: mpsc::UnboundedSender<WriteCommand>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SyncInner {
    state: SyncState,
    user: Option<String>,
    writer: Option<WriteThrough>,
}

impl SyncInner {
    fn stop_writer(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.handle.abort();
        }
    }
}

/// Shared by the session, the midnight timer and the command layer; every
/// method takes `&self`.
pub struct Synchronizer {
    remote: Arc<dyn RemoteStore>,
    inner: Mutex<SyncInner>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Synchronizer")
            .field("state", &inner.state)
            .field("user", &inner.user)
            .field("write_through", &inner.writer.is_some())
            .finish()
    }
}

impl Synchronizer {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            inner: Mutex::new(SyncInner::default()),
        }
    }

    pub fn state(&self) -> SyncState {
        self.lock().state
    }

    pub fn user(&self) -> Option<String> {
        self.lock().user.clone()
    }

    /// Reconcile `local` against the remote document for `user`.
    ///
    /// On `AdoptedRemote` the caller must replace its ledger and cache with
    /// the returned document before mutating again.
    pub async fn reconcile(&self, user: &str, local: &Ledger, username: &str) -> Reconciliation {
        {
            let mut inner = self.lock();
            inner.stop_writer();
            inner.user = Some(user.to_string());
            inner.state = SyncState::Reconciling;
        }
        debug!(user, "reconciling with remote store");

        let outcome = match self.remote.fetch(user).await {
            Ok(Some(document)) => {
                info!(user, tasks = document.tasks.len(), "remote document adopted");
                Reconciliation::AdoptedRemote(document)
            }
            Ok(None) => {
                let document = RemoteDocument::from_ledger(local, username);
                match self.remote.create(user, &document).await {
                    Ok(()) => info!(user, tasks = document.tasks.len(), "remote document created from local state"),
                    Err(err) => warn!(user, error = %err, "failed to create remote document"),
                }
                Reconciliation::CreatedRemote
            }
            Err(err) => {
                warn!(user, error = %err, "remote fetch failed; write-through stays off");
                return Reconciliation::Offline;
            }
        };

        let mut inner = self.lock();
        // A sign-out that raced the fetch wins.
        if inner.user.as_deref() != Some(user) || inner.state != SyncState::Reconciling {
            debug!(user, "reconciliation superseded");
            return outcome;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(Arc::clone(&self.remote), user.to_string(), rx));
        inner.writer = Some(WriteThrough { tx, handle });
        inner.state = SyncState::Synced;
        outcome
    }

    /// Queue a full-document write. Returns `false` (and writes nothing)
    /// unless reconciliation has completed.
    pub fn push(&self, document: RemoteDocument) -> bool {
        let inner = self.lock();
        let Some(writer) = inner
            .writer
            .as_ref()
            .filter(|_| inner.state == SyncState::Synced)
        else {
            debug!(state = ?inner.state, "write-through suppressed before reconciliation");
            return false;
        };
        writer.tx.send(WriteCommand::Write(document)).is_ok()
    }

    /// Wait until every document queued so far has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        let sent = match self.lock().writer.as_ref() {
            Some(writer) => writer.tx.send(WriteCommand::Flush(done_tx)).is_ok(),
            None => false,
        };
        if sent {
            let _ = done_rx.await;
        }
    }

    /// Abort pending writes, stamp the remote last-access date, and return
    /// to `Unauthenticated`.
    pub async fn sign_out(&self, today: NaiveDate) {
        let signed_in = {
            let mut inner = self.lock();
            let was_synced = inner.state == SyncState::Synced;
            inner.stop_writer();
            inner.state = SyncState::Unauthenticated;
            inner.user.take().filter(|_| was_synced)
        };
        if let Some(user) = signed_in {
            if let Err(err) = self.remote.touch_last_access(&user, today).await {
                warn!(user = %user, error = %err, "failed to record last access");
            }
        }
    }

    /// Drop back to `Unauthenticated` without talking to the remote.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        inner.stop_writer();
        inner.user = None;
        inner.state = SyncState::Unauthenticated;
    }

    fn lock(&self) -> MutexGuard<'_, SyncInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.lock().stop_writer();
    }
}

async fn write_loop(
    remote: Arc<dyn RemoteStore>,
    user: String,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
) {
    while let Some(first) = rx.recv().await {
        let mut latest = None;
        let mut waiters = Vec::new();
        let mut coalesced = 0usize;

        let mut next = Some(first);
        while let Some(command) = next {
            match command {
                WriteCommand::Write(document) => {
                    if latest.replace(document).is_some() {
                        coalesced += 1;
                    }
                }
                WriteCommand::Flush(done) => waiters.push(done),
            }
            next = rx.try_recv().ok();
        }

        if let Some(document) = latest {
            match remote.update(&user, &document).await {
                Ok(()) => debug!(user = %user, coalesced, "remote document updated"),
                Err(err) => warn!(user = %user, error = %err, "remote write failed; local state kept"),
            }
        }

        for done in waiters {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::{local_at, parse_day};
    use crate::remote::MemoryRemoteStore;

    fn ledger_with(text: &str) -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .add_task(text, local_at(parse_day("2024-05-01").unwrap(), 8))
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn push_is_refused_before_reconciliation() {
        let store = MemoryRemoteStore::new();
        let sync = Synchronizer::new(Arc::new(store.clone()));
        assert_eq!(sync.state(), SyncState::Unauthenticated);
        assert!(!sync.push(RemoteDocument::default()));
        sync.flush().await;
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn first_login_creates_remote_from_local() {
        let store = MemoryRemoteStore::new();
        let sync = Synchronizer::new(Arc::new(store.clone()));
        let local = ledger_with("local task");

        let outcome = sync.reconcile("u1", &local, "Ada").await;
        assert_eq!(outcome, Reconciliation::CreatedRemote);
        assert_eq!(sync.state(), SyncState::Synced);
        assert_eq!(
            store.document("u1"),
            Some(RemoteDocument::from_ledger(&local, "Ada"))
        );
    }

    #[tokio::test]
    async fn existing_remote_wins() {
        let remote_doc = RemoteDocument::from_ledger(&ledger_with("remote task"), "Ada");
        let store = MemoryRemoteStore::new().with_document("u1", remote_doc.clone());
        let sync = Synchronizer::new(Arc::new(store.clone()));

        let outcome = sync.reconcile("u1", &ledger_with("stale local"), "").await;
        assert_eq!(outcome, Reconciliation::AdoptedRemote(remote_doc.clone()));
        assert_eq!(store.document("u1"), Some(remote_doc));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn offline_reconcile_keeps_write_through_off() {
        let store = MemoryRemoteStore::new();
        store.set_unavailable(true);
        let sync = Synchronizer::new(Arc::new(store.clone()));

        let outcome = sync.reconcile("u1", &Ledger::new(), "").await;
        assert_eq!(outcome, Reconciliation::Offline);
        assert_eq!(sync.state(), SyncState::Reconciling);

        store.set_unavailable(false);
        assert!(!sync.push(RemoteDocument::default()));
        sync.flush().await;
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn writes_flow_through_after_sync() {
        let store = MemoryRemoteStore::new();
        let sync = Synchronizer::new(Arc::new(store.clone()));
        sync.reconcile("u1", &Ledger::new(), "Ada").await;

        let next = RemoteDocument::from_ledger(&ledger_with("new task"), "Ada");
        assert!(sync.push(next.clone()));
        sync.flush().await;
        assert_eq!(store.document("u1"), Some(next));
    }

    #[tokio::test]
    async fn failed_write_is_dropped_and_next_one_resyncs() {
        let store = MemoryRemoteStore::new();
        let sync = Synchronizer::new(Arc::new(store.clone()));
        sync.reconcile("u1", &Ledger::new(), "Ada").await;

        store.set_unavailable(true);
        assert!(sync.push(RemoteDocument::from_ledger(&ledger_with("lost"), "Ada")));
        sync.flush().await;
        assert!(store.document("u1").unwrap().tasks.is_empty());

        store.set_unavailable(false);
        let next = RemoteDocument::from_ledger(&ledger_with("kept"), "Ada");
        sync.push(next.clone());
        sync.flush().await;
        assert_eq!(store.document("u1"), Some(next));
    }

    #[tokio::test]
    async fn sign_out_stamps_last_access_and_disables_pushes() {
        let store = MemoryRemoteStore::new();
        let sync = Synchronizer::new(Arc::new(store.clone()));
        sync.reconcile("u1", &Ledger::new(), "Ada").await;

        let day = parse_day("2024-05-03").unwrap();
        sync.sign_out(day).await;
        assert_eq!(sync.state(), SyncState::Unauthenticated);
        assert_eq!(sync.user(), None);
        assert_eq!(store.document("u1").unwrap().last_access, Some(day));
        assert!(!sync.push(RemoteDocument::default()));
    }
}
