//! trackzero journal command implementation

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::day::parse_day;
use crate::error::Result;
use crate::ledger::JournalEntry;
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::{note_sync, with_session};

/// Options for `trackzero journal add`
pub struct AddOptions {
    pub text: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Options for `trackzero journal show`
pub struct ShowOptions {
    pub date: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct AddReport {
    date: NaiveDate,
    entry: JournalEntry,
}

#[derive(Serialize)]
struct ShowReport {
    date: NaiveDate,
    entries: Vec<JournalEntry>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    with_session(options.root.as_deref(), |session| {
        let applied = session.add_journal_entry(&options.text)?;
        let report = AddReport {
            date: applied.view.today,
            entry: applied.value,
        };

        let mut human = HumanOutput::new(format!("trackzero journal add: {}", report.date));
        human.push_summary("entries today", session.journal_for(report.date).len().to_string());
        note_sync(session, &mut human);

        emit_success(
            OutputOptions {
                json: options.json,
                quiet: options.quiet,
            },
            "journal add",
            &report,
            Some(&human),
        )
    })
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let date = options.date.as_deref().map(parse_day).transpose()?;

    with_session(options.root.as_deref(), |session| {
        let date = date.unwrap_or_else(|| session.today());
        let report = ShowReport {
            date,
            entries: session.journal_for(date),
        };

        let mut human = HumanOutput::new(format!("Journal {date} ({})", report.entries.len()));
        for entry in &report.entries {
            human.push_line(format_entry_line(entry));
        }
        note_sync(session, &mut human);

        emit_success(
            OutputOptions {
                json: options.json,
                quiet: options.quiet,
            },
            "journal show",
            &report,
            Some(&human),
        )
    })
}

fn format_entry_line(entry: &JournalEntry) -> String {
    let at = entry.timestamp.with_timezone(&Local).format("%H:%M");
    format!("{at}  {}", entry.text)
}
