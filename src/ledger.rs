//! Activity ledger: tasks, per-day completion counts, and journal entries.
//!
//! The ledger is the in-memory state of one signed-in session. It knows
//! nothing about persistence; callers pass the current time in and the
//! session layer persists and pushes after every mutation.
//!
//! Invariant: after any `add_task`/`toggle_task`/`delete_task`,
//! `completed_on(today)` equals the number of tasks with `completed == true`.
//! Counts for earlier days are never rewritten.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Task identifier: wall-clock milliseconds at creation, bumped on collision.
pub type TaskId = i64;

/// Completed-task count per local calendar day.
pub type CompletedCount = BTreeMap<NaiveDate, u32>;

/// Journal entries per local calendar day, oldest first.
pub type JournalEntries = BTreeMap<NaiveDate, Vec<JournalEntry>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    tasks: Vec<Task>,
    completed: CompletedCount,
    journal: JournalEntries,
    last_minted: TaskId,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted parts (cache snapshot or remote document).
    pub fn from_parts(tasks: Vec<Task>, completed: CompletedCount, journal: JournalEntries) -> Self {
        Self {
            tasks,
            completed,
            journal,
            last_minted: 0,
        }
    }

    pub fn into_parts(self) -> (Vec<Task>, CompletedCount, JournalEntries) {
        (self.tasks, self.completed, self.journal)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn completed_tasks(&self) -> &CompletedCount {
        &self.completed
    }

    pub fn journal_entries(&self) -> &JournalEntries {
        &self.journal
    }

    /// Entries written on `date`, in the order they were added.
    pub fn journal_for(&self, date: NaiveDate) -> &[JournalEntry] {
        self.journal
            .get(&date)
            .map(|entries| entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn completed_on(&self, date: NaiveDate) -> u32 {
        self.completed.get(&date).copied().unwrap_or(0)
    }

    /// Whether a count has been recorded for `date`, zero included.
    pub fn has_count_for(&self, date: NaiveDate) -> bool {
        self.completed.contains_key(&date)
    }

    pub fn completed_now(&self) -> u32 {
        self.tasks.iter().filter(|task| task.completed).count() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.completed.is_empty() && self.journal.is_empty()
    }

    /// Prepend a new, incomplete task.
    pub fn add_task(&mut self, text: &str, now: DateTime<Local>) -> Result<Task> {
        let text = non_blank(text, "task text")?;
        let task = Task {
            id: self.mint_id(now),
            text: text.to_string(),
            completed: false,
        };
        self.tasks.insert(0, task.clone());
        self.recount(now.date_naive());
        Ok(task)
    }

    /// Flip a task's completion flag and recount today.
    pub fn toggle_task(&mut self, id: TaskId, today: NaiveDate) -> Result<Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        task.completed = !task.completed;
        let toggled = task.clone();
        self.recount(today);
        Ok(toggled)
    }

    /// Remove a task and recount today.
    pub fn delete_task(&mut self, id: TaskId, today: NaiveDate) -> Result<Task> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        let removed = self.tasks.remove(index);
        self.recount(today);
        Ok(removed)
    }

    /// Append a journal entry under the local date of `now`.
    pub fn add_journal_entry(&mut self, text: &str, now: DateTime<Local>) -> Result<JournalEntry> {
        let text = non_blank(text, "journal entry")?;
        let entry = JournalEntry {
            timestamp: now.with_timezone(&Utc),
            text: text.to_string(),
        };
        self.journal
            .entry(now.date_naive())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    /// Clear every completion flag. Counts are left alone, so the day that
    /// just ended keeps the total it had before the flags were cleared.
    pub fn clear_completion(&mut self) -> usize {
        let mut cleared = 0;
        for task in self.tasks.iter_mut().filter(|task| task.completed) {
            task.completed = false;
            cleared += 1;
        }
        cleared
    }

    fn recount(&mut self, today: NaiveDate) {
        let count = self.completed_now();
        // Days with no activity stay absent rather than holding an explicit zero.
        if count > 0 || self.completed.contains_key(&today) {
            self.completed.insert(today, count);
        }
    }

    fn mint_id(&mut self, now: DateTime<Local>) -> TaskId {
        let highest = self.tasks.iter().map(|task| task.id).max().unwrap_or(0);
        let id = now
            .timestamp_millis()
            .max(highest.saturating_add(1))
            .max(self.last_minted.saturating_add(1));
        self.last_minted = id;
        id
    }
}

fn non_blank<'a>(text: &'a str, what: &str) -> Result<&'a str> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{what} cannot be empty")));
    }
    Ok(text)
}
