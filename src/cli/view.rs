//! trackzero streak/calendar/status command implementation
//!
//! Read-only views; they still run a full session so the startup reset
//! and reconciliation apply before anything is shown.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::{note_sync, with_session};

/// Options shared by the view commands
pub struct ViewOptions {
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl ViewOptions {
    fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

#[derive(Serialize)]
struct StreakReport {
    today: NaiveDate,
    streak: u32,
    completed_today: u32,
}

pub fn run_streak(options: ViewOptions) -> Result<()> {
    with_session(options.root.as_deref(), |session| {
        let view = session.view();
        let report = StreakReport {
            today: view.today,
            streak: view.streak,
            completed_today: view.completed_today,
        };

        let days = if report.streak == 1 { "day" } else { "days" };
        let mut human = HumanOutput::new(format!("Streak: {} {days}", report.streak));
        human.push_summary("completed today", report.completed_today.to_string());
        if report.completed_today == 0 {
            human.push_next_step("trackzero task toggle <id>");
        }
        note_sync(session, &mut human);

        emit_success(options.output(), "streak", &report, Some(&human))
    })
}

pub fn run_calendar(options: ViewOptions) -> Result<()> {
    with_session(options.root.as_deref(), |session| {
        let calendar = session.calendar();

        let mut human = HumanOutput::new(format!("Activity {}", calendar.year));
        for line in calendar.render_text().lines().skip(1) {
            human.push_line(line);
        }
        note_sync(session, &mut human);

        emit_success(options.output(), "calendar", &calendar, Some(&human))
    })
}

pub fn run_status(options: ViewOptions) -> Result<()> {
    with_session(options.root.as_deref(), |session| {
        let status = session.status();

        let mut human = HumanOutput::new(format!("trackzero status: {}", status.user_id));
        if !status.username.is_empty() {
            human.push_summary("name", status.username.clone());
        }
        human.push_summary("sync", format!("{:?}", status.sync_state).to_lowercase());
        human.push_summary("tasks", status.tasks.to_string());
        human.push_summary("completed today", status.completed_today.to_string());
        human.push_summary("streak", status.streak.to_string());
        human.push_summary("journal today", status.journal_today.to_string());
        if let Some(date) = status.last_reset_date {
            human.push_summary("last reset", date.to_string());
        }
        note_sync(session, &mut human);

        emit_success(options.output(), "status", &status, Some(&human))
    })
}
