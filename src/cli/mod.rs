//! Command-line interface for trackzero
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule. Every command
//! except `login` runs inside one session: sign in, reconcile, operate,
//! flush, tear down.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::cache::LocalCache;
use crate::config::Config;
use crate::day::SystemClock;
use crate::error::{Error, Result};
use crate::identity::{FileIdentityProvider, Identity, IdentityProvider};
use crate::ledger::TaskId;
use crate::output::HumanOutput;
use crate::remote::FileRemoteStore;
use crate::session::{Session, SessionContext, SessionSettings};
use crate::storage::{Storage, ROOT_ENV};
use crate::sync::Reconciliation;

mod journal;
mod login;
mod task;
mod view;

/// trackzero - daily tasks, non-zero-day streaks, and a journal
///
/// Keeps a local cache in sync with a remote document per user, resets
/// task completion every local midnight, and renders a year of activity.
#[derive(Parser, Debug)]
#[command(name = "trackzero")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = ROOT_ENV)]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and reconcile with the remote store
    Login {
        /// User identifier
        user_id: String,

        /// Display name stored with the remote document
        #[arg(long)]
        name: Option<String>,
    },

    /// Record last access, clear local data, and sign out
    Logout,

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Journal entries
    #[command(subcommand)]
    Journal(JournalCommands),

    /// Show the current non-zero-day streak
    Streak,

    /// Render this year's activity calendar
    Calendar,

    /// Summarize the signed-in session
    Status,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task to the top of the list
    Add {
        /// Task text, stored exactly as given (quote it)
        text: String,
    },

    /// Flip a task's completion for today
    Toggle {
        /// Task id
        id: TaskId,
    },

    /// Delete a task
    Rm {
        /// Task id
        id: TaskId,
    },

    /// List tasks
    Ls,
}

#[derive(Subcommand, Debug)]
pub enum JournalCommands {
    /// Append an entry to today's journal
    Add {
        /// Entry text, stored exactly as given (quote it)
        text: String,
    },

    /// Show the entries written on a date
    Show {
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Login { user_id, name } => login::run_login(login::LoginOptions {
                user_id,
                name,
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Logout => login::run_logout(login::LogoutOptions {
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add { text } => task::run_add(task::AddOptions {
                    text,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Toggle { id } => task::run_toggle(task::ToggleOptions {
                    id,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Rm { id } => task::run_rm(task::RmOptions {
                    id,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Ls => task::run_ls(task::LsOptions {
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
            },
            Commands::Journal(cmd) => match cmd {
                JournalCommands::Add { text } => journal::run_add(journal::AddOptions {
                    text,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                JournalCommands::Show { date } => journal::run_show(journal::ShowOptions {
                    date,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
            },
            Commands::Streak => view::run_streak(view::ViewOptions {
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Calendar => view::run_calendar(view::ViewOptions {
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Status => view::run_status(view::ViewOptions {
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
        }
    }
}

/// Resolved data root, configuration and identity store for one invocation.
pub(crate) struct Environment {
    storage: Storage,
    config: Config,
    identities: FileIdentityProvider,
}

impl Environment {
    pub(crate) fn open(root: Option<&Path>) -> Result<Self> {
        let storage = Storage::discover(root)?;
        let config = Config::load_from_root(storage.root());
        let identities = FileIdentityProvider::new(storage.clone());
        Ok(Self {
            storage,
            config,
            identities,
        })
    }

    pub(crate) fn session_context(&self) -> SessionContext {
        let lock_timeout = self.config.cache.lock_timeout_ms;
        let remote = FileRemoteStore::new(self.config.remote.resolve_dir(&self.storage))
            .with_lock_timeout(lock_timeout);
        SessionContext {
            cache: LocalCache::new(self.storage.clone()).with_lock_timeout(lock_timeout),
            remote: Arc::new(remote),
            clock: Arc::new(SystemClock),
            settings: SessionSettings::from(&self.config),
        }
    }

    /// Run `op` inside a session for `identity`, then flush and tear down.
    pub(crate) fn in_session<T>(
        &self,
        identity: Identity,
        op: impl FnOnce(&Session) -> Result<T>,
    ) -> Result<T> {
        let runtime = runtime()?;
        runtime.block_on(async {
            let session = Session::sign_in(identity, self.session_context()).await;
            let result = op(&session);
            session.close().await;
            result
        })
    }
}

/// Run `op` inside a session for the signed-in identity.
pub(crate) fn with_session<T>(
    root: Option<&Path>,
    op: impl FnOnce(&Session) -> Result<T>,
) -> Result<T> {
    let env = Environment::open(root)?;
    let identity = env.identities.require()?;
    env.in_session(identity, op)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| Error::OperationFailed(format!("failed to start async runtime: {err}")))
}

/// Surface an offline session to the user; the command itself still succeeds.
pub(crate) fn note_sync(session: &Session, human: &mut HumanOutput) {
    if matches!(session.reconciliation(), Reconciliation::Offline) {
        human.push_warning("remote store unreachable; changes are kept locally");
    }
}
