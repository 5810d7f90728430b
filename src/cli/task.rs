//! trackzero task command implementation

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::ledger::{Task, TaskId};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::session::SessionView;

use super::{note_sync, with_session};

/// Options for `trackzero task add`
pub struct AddOptions {
    pub text: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Options for `trackzero task toggle`
pub struct ToggleOptions {
    pub id: TaskId,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Options for `trackzero task rm`
pub struct RmOptions {
    pub id: TaskId,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Options for `trackzero task ls`
pub struct LsOptions {
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct TaskReport {
    task: Task,
    completed_today: u32,
    streak: u32,
}

impl TaskReport {
    fn new(task: Task, view: &SessionView) -> Self {
        Self {
            task,
            completed_today: view.completed_today,
            streak: view.streak,
        }
    }
}

pub fn run_add(options: AddOptions) -> Result<()> {
    with_session(options.root.as_deref(), |session| {
        let applied = session.add_task(&options.text)?;
        let report = TaskReport::new(applied.value, &applied.view);

        let mut human = HumanOutput::new(format!("trackzero task add: {}", report.task.id));
        human.push_summary("text", report.task.text.clone());
        note_sync(session, &mut human);
        human.push_next_step(format!("trackzero task toggle {}", report.task.id));

        emit_success(output_options(options.json, options.quiet), "task add", &report, Some(&human))
    })
}

pub fn run_toggle(options: ToggleOptions) -> Result<()> {
    with_session(options.root.as_deref(), |session| {
        let applied = session.toggle_task(options.id)?;
        let report = TaskReport::new(applied.value, &applied.view);

        let state = if report.task.completed { "done" } else { "open" };
        let mut human = HumanOutput::new(format!("trackzero task toggle: {} {state}", report.task.id));
        human.push_summary("completed today", report.completed_today.to_string());
        human.push_summary("streak", report.streak.to_string());
        note_sync(session, &mut human);

        emit_success(output_options(options.json, options.quiet), "task toggle", &report, Some(&human))
    })
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    with_session(options.root.as_deref(), |session| {
        let applied = session.delete_task(options.id)?;
        let report = TaskReport::new(applied.value, &applied.view);

        let mut human = HumanOutput::new(format!("trackzero task rm: {}", report.task.id));
        human.push_summary("text", report.task.text.clone());
        human.push_summary("completed today", report.completed_today.to_string());
        note_sync(session, &mut human);

        emit_success(output_options(options.json, options.quiet), "task rm", &report, Some(&human))
    })
}

pub fn run_ls(options: LsOptions) -> Result<()> {
    with_session(options.root.as_deref(), |session| {
        let view = session.view();

        let mut human = HumanOutput::new(format!("Tasks ({})", view.tasks.len()));
        for task in &view.tasks {
            human.push_line(format_task_line(task));
        }
        human.push_summary("completed today", view.completed_today.to_string());
        human.push_summary("streak", view.streak.to_string());
        note_sync(session, &mut human);
        if view.tasks.is_empty() {
            human.push_next_step("trackzero task add <text>");
        }

        emit_success(output_options(options.json, options.quiet), "task ls", &view, Some(&human))
    })
}

fn format_task_line(task: &Task) -> String {
    let mark = if task.completed { 'x' } else { ' ' };
    format!("[{mark}] {} {}", task.id, task.text)
}

fn output_options(json: bool, quiet: bool) -> OutputOptions {
    OutputOptions { json, quiet }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_line_shows_mark_id_and_text() {
        let task = Task {
            id: 17,
            text: "Read 10 pages".to_string(),
            completed: true,
        };
        assert_eq!(format_task_line(&task), "[x] 17 Read 10 pages");
    }
}
