use chrono::NaiveDateTime;
use thiserror::Error;

use crate::core::task::{Task, TaskPatch};

/// Task-list id understood by the service as "the user's default list".
pub const DEFAULT_TASK_LIST: &str = "@default";

/// The two independent permission scopes a stored credential can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("task service unreachable: {0}")]
    Unreachable(String),
    #[error("unknown task list: {0}")]
    UnknownList(String),
    #[error("unknown task: {0}")]
    UnknownTask(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("no stored credentials for {0:?} access")]
    MissingCredentials(AccessMode),
}

impl ServiceError {
    /// Connectivity faults, as opposed to lookup faults.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::MissingCredentials(_))
    }
}

/// Filter for a task listing call. The due window is half-open,
/// `[due_min, due_max)`; `due_min = None` lifts the lower bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub task_list: String,
    pub due_min: Option<NaiveDateTime>,
    pub due_max: Option<NaiveDateTime>,
    pub show_completed: bool,
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListEntry {
    pub title: String,
    pub id: String,
}

/// The remote task-service capability. Implementations perform blocking
/// calls; every method runs to completion before returning.
pub trait TaskService {
    fn list(&self, query: &ListQuery) -> Result<Vec<Task>, ServiceError>;

    fn get(&self, task_list: &str, task_id: &str) -> Result<Task, ServiceError>;

    fn insert(&self, task_list: &str, task: &Task) -> Result<Task, ServiceError>;

    fn patch(&self, task_list: &str, task_id: &str, patch: &TaskPatch)
    -> Result<Task, ServiceError>;

    fn update(&self, task_list: &str, task_id: &str, task: &Task) -> Result<Task, ServiceError>;

    fn list_task_lists(&self) -> Result<Vec<TaskListEntry>, ServiceError>;
}

/// Yields an authorized service handle, or fails. Whether a usable
/// credential is already stored for a scope is checkable without triggering
/// an interactive auth flow.
pub trait ServiceConnector {
    type Service: TaskService;

    fn credentials_stored(&self, access: AccessMode) -> bool;

    fn connect(&self, access: AccessMode) -> Result<Self::Service, ServiceError>;
}
