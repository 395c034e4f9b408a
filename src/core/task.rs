use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    NeedsAction,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsAction => "needsAction",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "needsAction" => Some(Self::NeedsAction),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A remote-service task record.
///
/// `id` and `etag` are assigned by the service; both are absent on a task
/// composed locally that has not been submitted yet. `due` is carried as a
/// datetime because that is the wire encoding, but only the date part has
/// meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<String>,
    pub etag: Option<String>,
    pub title: String,
    pub notes: String,
    pub due: Option<NaiveDateTime>,
    pub status: TaskStatus,
    /// Completion timestamp, populated by the service when a task is
    /// marked completed.
    pub completed: Option<NaiveDateTime>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            etag: None,
            title: title.into(),
            notes: String::new(),
            due: None,
            status: TaskStatus::NeedsAction,
            completed: None,
        }
    }

    /// The due date at day granularity.
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due.map(|dt| dt.date())
    }

    /// Still due today or later.
    pub fn is_still_due(&self, today: NaiveDate) -> bool {
        self.due_date().is_some_and(|d| d >= today)
    }
}

/// Partial-update payload for `TaskService::patch`. Absent fields are left
/// untouched by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due: Option<NaiveDateTime>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch carrying every user-editable field of `task`.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            notes: Some(task.notes.clone()),
            due: task.due,
            status: Some(task.status),
        }
    }
}
