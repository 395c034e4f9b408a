use chrono::Duration;

use crate::config::TetherConfig;
use crate::core::task::{Task, TaskPatch, TaskStatus};
use crate::core::temporal;
use crate::document::{CheckboxObserver, Editor};
use crate::outline::writer::{CHECKED_MARKER, UNCHECKED_MARKER};
use crate::outline::{anchor, parser, writer};
use crate::report::Reporter;

use super::service::TaskService;

/// Uploads new or edited tasks and mirrors checkbox toggles to the remote
/// service. Remote-call failures are reported and surface as `false`; they
/// never propagate to the caller.
pub struct TaskSubmitter<'a, S: TaskService> {
    service: &'a S,
    config: &'a TetherConfig,
    reporter: &'a dyn Reporter,
    task_list: String,
}

impl<'a, S: TaskService> TaskSubmitter<'a, S> {
    pub fn new(
        service: &'a S,
        config: &'a TetherConfig,
        reporter: &'a dyn Reporter,
        task_list: impl Into<String>,
    ) -> Self {
        Self {
            service,
            config,
            reporter,
            task_list: task_list.into(),
        }
    }

    /// Upload `task`: patch when it already has a remote id, insert
    /// otherwise. A missing due date defaults to tomorrow morning.
    ///
    /// On failure the original text is put back into the document at the
    /// caret, so the user's cut selection is never lost.
    pub fn submit(&self, editor: &mut dyn Editor, mut task: Task) -> bool {
        let original_text = writer::render_task(&task, self.config.due_annotation).ok();

        if task.due.is_none() {
            task.due = Some(temporal::morning_of(temporal::today() + Duration::days(1)));
        }

        let result = match task.id.as_deref() {
            Some(id) => self
                .service
                .patch(&self.task_list, id, &TaskPatch::from_task(&task))
                .map(|_| format!("Task '{}' updated.", task.title)),
            None => self
                .service
                .insert(&self.task_list, &task)
                .map(|_| format!("Task '{}' created.", task.title)),
        };

        match result {
            Ok(message) => {
                self.reporter.info(&message);
                true
            }
            Err(e) => {
                self.reporter
                    .info(&format!("Error in communication with the task service: {}", e));
                if let Some(text) = original_text {
                    editor.insert_at_caret(&text);
                }
                false
            }
        }
    }

    /// Mirror a checkbox toggle to the remote task.
    ///
    /// Completing is a partial update; the service fills in the completion
    /// timestamp itself. Un-completing has to fetch the full record, drop
    /// the timestamp and resubmit it whole, because the service refuses to
    /// clear the timestamp through a patch.
    pub fn task_checked(&self, task_id: &str, checked: bool) -> bool {
        let result = if checked {
            self.service
                .patch(
                    &self.task_list,
                    task_id,
                    &TaskPatch::status(TaskStatus::Completed),
                )
                .map(|_| TaskStatus::Completed)
        } else {
            self.service
                .get(&self.task_list, task_id)
                .and_then(|mut task| {
                    task.completed = None;
                    task.status = TaskStatus::NeedsAction;
                    self.service.update(&self.task_list, task_id, &task)
                })
                .map(|_| TaskStatus::NeedsAction)
        };

        match result {
            Ok(status) => {
                self.reporter.info(&format!("Marked as {}", status.as_str()));
                true
            }
            Err(e) => {
                self.reporter
                    .info(&format!("Error in communication with the task service: {}", e));
                false
            }
        }
    }

    /// Parse the current selection into a task and cut it from the buffer.
    /// The cut text comes back through [`TaskSubmitter::submit`]'s failure
    /// path if the upload does not go through.
    pub fn read_task_from_selection(&self, editor: &mut dyn Editor) -> Option<Task> {
        let text = editor.selected_text()?;
        let task = parser::parse_selection(&text, self.config.due_annotation);
        let (start, end) = editor.selection()?;
        editor.delete_range(start, end);
        Some(task)
    }

    /// When nothing is selected, select a task block starting at the caret
    /// line: the line itself plus following lines up to the next empty
    /// line, checkbox line or anchored line.
    pub fn autoselect_task_block(&self, editor: &mut dyn Editor) -> bool {
        if editor.selection().is_some() {
            return true;
        }
        let first = editor.caret_line();
        let mut last = first;
        loop {
            let candidate = last + 1;
            match editor.line_text(candidate) {
                Some(text)
                    if !text.trim().is_empty()
                        && !text.starts_with(UNCHECKED_MARKER)
                        && !text.starts_with(CHECKED_MARKER)
                        && anchor::find_anchor_in_line(&text).is_none() =>
                {
                    last = candidate;
                }
                _ => break,
            }
        }
        let (Some(start), Some(last_start)) =
            (editor.line_start_offset(first), editor.line_start_offset(last))
        else {
            return false;
        };
        let Some(last_text) = editor.line_text(last) else {
            return false;
        };
        editor.select_range(start, last_start + last_text.chars().count());
        true
    }
}

/// The observer a host registers on its editor so that user checkbox
/// toggles reach the remote service. Resolves the toggled line's anchor and
/// forwards the new state; a failed remote write vetoes the toggle, leaving
/// the document line untouched.
pub struct ToggleBridge<S: TaskService, R: Reporter> {
    service: S,
    config: TetherConfig,
    reporter: R,
    task_list: String,
}

impl<S: TaskService, R: Reporter> ToggleBridge<S, R> {
    pub fn new(service: S, config: TetherConfig, reporter: R, task_list: impl Into<String>) -> Self {
        Self {
            service,
            config,
            reporter,
            task_list: task_list.into(),
        }
    }
}

impl<S: TaskService, R: Reporter> CheckboxObserver for ToggleBridge<S, R> {
    fn checkbox_toggled(&mut self, editor: &mut dyn Editor, line: usize, checked: bool) -> bool {
        let Some(task_id) = anchor::resolve(editor, line) else {
            // Not a remote-backed line; the toggle is purely local.
            return true;
        };
        let submitter = TaskSubmitter::new(
            &self.service,
            &self.config,
            &self.reporter,
            self.task_list.clone(),
        );
        submitter.task_checked(&task_id, checked)
    }
}
