use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::core::task::{Task, TaskStatus};
use crate::core::temporal;

use super::anchor::{ANCHORED_LINE_RE, bullet_is_checked};

/// Trailing due annotation in a title: ` >YYYY-MM-DD` or ` >YYYY-MM`.
static DUE_ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*>(?P<year>\d{4})-(?P<month>\d{2})(?:-(?P<day>\d{2}))?\s*$").unwrap()
});

/// Parse the dumped text of a user selection into a task.
///
/// The first line is matched against the anchor grammar: on a match the
/// remote id and the bullet-encoded status are extracted and the remainder
/// becomes the title; otherwise the whole first line (trimmed) is the title
/// of a local-only task. Remaining lines become the notes, each stripped of
/// the one-tab continuation indent the writer adds.
///
/// With `extract_due` enabled, a trailing ` >YYYY-MM-DD` annotation is
/// pulled out of the title into the due date; a partial `>YYYY-MM` defaults
/// the day to 01.
pub fn parse_selection(text: &str, extract_due: bool) -> Task {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or("");

    let mut task = match ANCHORED_LINE_RE.captures(first) {
        Some(caps) => {
            let mut task = Task::new(caps["title"].trim_end());
            task.id = Some(caps["id"].to_string());
            let checked = caps
                .name("bullet")
                .and_then(|m| m.as_str().chars().next())
                .is_some_and(bullet_is_checked);
            if checked {
                task.status = TaskStatus::Completed;
            }
            task
        }
        None => Task::new(first.trim()),
    };

    if extract_due {
        let title = task.title.clone();
        if let Some(caps) = DUE_ANNOTATION_RE.captures(&title) {
            let year: i32 = caps["year"].parse().unwrap_or(0);
            let month: u32 = caps["month"].parse().unwrap_or(1);
            let day: u32 = caps
                .name("day")
                .map_or(1, |m| m.as_str().parse().unwrap_or(1));
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                task.due = Some(temporal::morning_of(date));
                let span = caps.get(0).unwrap();
                task.title.truncate(title.len() - span.as_str().len());
            }
        }
    }

    let notes: Vec<&str> = lines
        .map(|l| l.strip_prefix('\t').unwrap_or(l))
        .collect();
    task.notes = notes.join("\n");

    task
}
