//! trackzero login/logout command implementation

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::identity::{Identity, IdentityProvider};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::sync::{Reconciliation, SyncState};

use super::{note_sync, Environment};

/// Options for `trackzero login`
pub struct LoginOptions {
    pub user_id: String,
    pub name: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Options for `trackzero logout`
pub struct LogoutOptions {
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct LoginReport {
    user_id: String,
    username: String,
    reconciliation: &'static str,
    sync_state: SyncState,
    tasks: usize,
}

#[derive(Serialize)]
struct LogoutReport {
    user_id: String,
    last_access: chrono::NaiveDate,
}

pub fn run_login(options: LoginOptions) -> Result<()> {
    let env = Environment::open(options.root.as_deref())?;
    let identity = Identity::new(&options.user_id, options.name.as_deref())?;
    env.identities.sign_in(&identity)?;

    env.in_session(identity, |session| {
        let reconciliation = match session.reconciliation() {
            Reconciliation::AdoptedRemote(_) => "adopted_remote",
            Reconciliation::CreatedRemote => "created_remote",
            Reconciliation::Offline => "offline",
        };
        let report = LoginReport {
            user_id: session.identity().user_id.clone(),
            username: session.username(),
            reconciliation,
            sync_state: session.sync_state(),
            tasks: session.tasks().len(),
        };

        let mut human = HumanOutput::new(format!("trackzero login: {}", report.user_id));
        if !report.username.is_empty() {
            human.push_summary("name", report.username.clone());
        }
        human.push_summary("reconciliation", reconciliation.replace('_', " "));
        human.push_summary("tasks", report.tasks.to_string());
        note_sync(session, &mut human);
        human.push_next_step("trackzero task add <text>");

        emit_success(
            OutputOptions {
                json: options.json,
                quiet: options.quiet,
            },
            "login",
            &report,
            Some(&human),
        )
    })
}

pub fn run_logout(options: LogoutOptions) -> Result<()> {
    let env = Environment::open(options.root.as_deref())?;
    let identity = env.identities.require()?;
    let user_id = identity.user_id.clone();

    let runtime = super::runtime()?;
    let today = runtime.block_on(async {
        let session = crate::session::Session::sign_in(identity, env.session_context()).await;
        let today = session.today();
        session.sign_out(&env.identities).await?;
        Ok::<_, crate::error::Error>(today)
    })?;

    let report = LogoutReport {
        user_id: user_id.clone(),
        last_access: today,
    };
    let mut human = HumanOutput::new(format!("trackzero logout: {user_id}"));
    human.push_summary("local data", "cleared");
    human.push_next_step("trackzero login <user-id>");

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "logout",
        &report,
        Some(&human),
    )
}
