use crate::core::task::Task;

use super::CodecError;
use super::anchor::render_anchor;

pub const UNCHECKED_MARKER: &str = "[ ] ";
pub const CHECKED_MARKER: &str = "[*] ";

/// Format a task as outline markup: checkbox bullet, anchor link (when the
/// task has a remote id), title, optional trailing due annotation, then the
/// notes as tab-indented continuation lines. The result always ends with a
/// newline.
///
/// A task without a title is a data-integrity fault and refuses to render.
pub fn render_task(task: &Task, include_due_marker: bool) -> Result<String, CodecError> {
    if task.title.is_empty() {
        log::error!("Task text is missing");
        return Err(CodecError::MissingTitle);
    }

    let mut out = String::new();
    out.push_str(if task.status.is_completed() {
        CHECKED_MARKER
    } else {
        UNCHECKED_MARKER
    });

    if let Some(ref id) = task.id {
        out.push_str(&render_anchor(id));
        out.push(' ');
    }

    // A title already starting with an unchecked bullet would double the
    // marker; strip exactly one occurrence.
    let title = task
        .title
        .strip_prefix(UNCHECKED_MARKER)
        .unwrap_or(&task.title);
    out.push_str(title);

    if include_due_marker {
        if let Some(due) = task.due_date() {
            out.push_str(&format!(" >{}", due.format("%Y-%m-%d")));
        }
    }
    out.push('\n');

    for line in task.notes.lines() {
        out.push('\t');
        out.push_str(line);
        out.push('\n');
    }

    Ok(out)
}
