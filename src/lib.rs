//! trackzero - local-first progress store
//!
//! Tracks daily completion of self-defined tasks and free-text journal
//! entries, derives a "non-zero day" streak, and renders a year-long
//! activity calendar. The interesting part is keeping an authoritative
//! remote document and a fast local cache consistent.
//!
//! # Core Concepts
//!
//! - **Ledger**: in-memory tasks, per-day completed counts, and journal
//! - **Local Cache**: durable mirror of the ledger, readable before any
//!   remote round-trip
//! - **Remote Synchronizer**: reconciles on sign-in (remote wins), then
//!   writes every mutation through
//! - **Daily Reset**: clears completion flags once per local day, guarded
//!   by a persisted marker
//!
//! # Module Organization
//!
//! - `day`: local calendar days and the `Clock` seam
//! - `ledger`: tasks, completion counts, journal entries
//! - `streak`, `calendar`: derived views
//! - `storage`, `lock`: data root layout, atomic writes, file locks
//! - `cache`: local cache
//! - `remote`: remote store trait and implementations
//! - `sync`: reconciliation and write-through
//! - `reset`: daily reset and midnight timer
//! - `identity`: signed-in user boundary
//! - `session`: per-sign-in context tying the above together
//! - `config`, `error`, `output`, `cli`: the command-line surface

pub mod cache;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod day;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod lock;
pub mod output;
pub mod remote;
pub mod reset;
pub mod session;
pub mod storage;
pub mod streak;
pub mod sync;

pub use error::{Error, Result};
