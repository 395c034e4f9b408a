use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::core::task::{Task, TaskPatch};
use crate::core::temporal;

use super::service::{
    AccessMode, DEFAULT_TASK_LIST, ListQuery, ServiceConnector, ServiceError, TaskListEntry,
    TaskService,
};

/// In-memory task service. Stores tasks behind a shared lock so a test can
/// keep one clone for inspection and hand another to the component under
/// test; only the transport layer is swapped relative to a real service.
///
/// The completion-timestamp rules mirror the remote API constraint the
/// submitter works around: `patch` auto-populates `completed` when marking a
/// task completed but never clears it, only a full `update` can.
#[derive(Clone, Default)]
pub struct FakeTaskService {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    tasks: BTreeMap<String, Task>,
    lists: Vec<TaskListEntry>,
    next_id: u64,
    next_etag: u64,
    unreachable: bool,
    list_calls: u64,
    get_calls: u64,
}

impl FakeState {
    fn next_etag(&mut self) -> String {
        self.next_etag += 1;
        format!("etag-{}", self.next_etag)
    }

    fn check_list(&self, task_list: &str) -> Result<(), ServiceError> {
        if task_list == DEFAULT_TASK_LIST || self.lists.iter().any(|l| l.id == task_list) {
            Ok(())
        } else {
            Err(ServiceError::UnknownList(task_list.to_string()))
        }
    }
}

impl FakeTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn add_list(&self, title: impl Into<String>, id: impl Into<String>) {
        self.state.lock().unwrap().lists.push(TaskListEntry {
            title: title.into(),
            id: id.into(),
        });
    }

    /// Store a task as if it already existed remotely, assigning an id and
    /// etag when missing. Returns the stored record.
    pub fn seed_task(&self, mut task: Task) -> Task {
        let mut state = self.state.lock().unwrap();
        if task.id.is_none() {
            state.next_id += 1;
            task.id = Some(format!("task-{}", state.next_id));
        }
        if task.etag.is_none() {
            task.etag = Some(state.next_etag());
        }
        let id = task.id.clone().unwrap();
        state.tasks.insert(id, task.clone());
        task
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.state.lock().unwrap().tasks.get(id).cloned()
    }

    pub fn list_calls(&self) -> u64 {
        self.state.lock().unwrap().list_calls
    }

    pub fn get_calls(&self) -> u64 {
        self.state.lock().unwrap().get_calls
    }
}

impl TaskService for FakeTaskService {
    fn list(&self, query: &ListQuery) -> Result<Vec<Task>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.unreachable {
            return Err(ServiceError::Unreachable("fake is offline".to_string()));
        }
        state.check_list(&query.task_list)?;

        let tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| query.show_completed || !t.status.is_completed())
            .filter(|t| match (query.due_min, query.due_max) {
                (None, None) => true,
                (min, max) => t.due.is_some_and(|due| {
                    min.is_none_or(|m| due >= m) && max.is_none_or(|m| due < m)
                }),
            })
            .take(query.max_results)
            .cloned()
            .collect();
        Ok(tasks)
    }

    fn get(&self, task_list: &str, task_id: &str) -> Result<Task, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        if state.unreachable {
            return Err(ServiceError::Unreachable("fake is offline".to_string()));
        }
        state.check_list(task_list)?;
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownTask(task_id.to_string()))
    }

    fn insert(&self, task_list: &str, task: &Task) -> Result<Task, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(ServiceError::Unreachable("fake is offline".to_string()));
        }
        state.check_list(task_list)?;

        let mut stored = task.clone();
        state.next_id += 1;
        stored.id = Some(format!("task-{}", state.next_id));
        stored.etag = Some(state.next_etag());
        if stored.status.is_completed() && stored.completed.is_none() {
            stored.completed = Some(temporal::now());
        }
        let id = stored.id.clone().unwrap();
        state.tasks.insert(id, stored.clone());
        Ok(stored)
    }

    fn patch(
        &self,
        task_list: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<Task, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(ServiceError::Unreachable("fake is offline".to_string()));
        }
        state.check_list(task_list)?;
        let etag = state.next_etag();
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| ServiceError::UnknownTask(task_id.to_string()))?;

        if let Some(ref title) = patch.title {
            task.title = title.clone();
        }
        if let Some(ref notes) = patch.notes {
            task.notes = notes.clone();
        }
        if let Some(due) = patch.due {
            task.due = Some(due);
        }
        if let Some(status) = patch.status {
            task.status = status;
            // The completion timestamp is auto-populated but a partial
            // update never clears it.
            if status.is_completed() && task.completed.is_none() {
                task.completed = Some(temporal::now());
            }
        }
        task.etag = Some(etag);
        Ok(task.clone())
    }

    fn update(&self, task_list: &str, task_id: &str, task: &Task) -> Result<Task, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(ServiceError::Unreachable("fake is offline".to_string()));
        }
        state.check_list(task_list)?;
        if !state.tasks.contains_key(task_id) {
            return Err(ServiceError::UnknownTask(task_id.to_string()));
        }

        let mut stored = task.clone();
        stored.id = Some(task_id.to_string());
        stored.etag = Some(state.next_etag());
        if stored.status.is_completed() && stored.completed.is_none() {
            stored.completed = Some(temporal::now());
        }
        state.tasks.insert(task_id.to_string(), stored.clone());
        Ok(stored)
    }

    fn list_task_lists(&self) -> Result<Vec<TaskListEntry>, ServiceError> {
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(ServiceError::Unreachable("fake is offline".to_string()));
        }
        Ok(state.lists.clone())
    }
}

/// Connector over a fake service: read-only credentials are always present,
/// write credentials only when enabled.
#[derive(Clone, Default)]
pub struct FakeConnector {
    service: FakeTaskService,
    write_allowed: bool,
}

impl FakeConnector {
    pub fn new(service: FakeTaskService, write_allowed: bool) -> Self {
        Self {
            service,
            write_allowed,
        }
    }
}

impl ServiceConnector for FakeConnector {
    type Service = FakeTaskService;

    fn credentials_stored(&self, access: AccessMode) -> bool {
        match access {
            AccessMode::ReadOnly => true,
            AccessMode::ReadWrite => self.write_allowed,
        }
    }

    fn connect(&self, access: AccessMode) -> Result<Self::Service, ServiceError> {
        if self.credentials_stored(access) {
            Ok(self.service.clone())
        } else {
            Err(ServiceError::MissingCredentials(access))
        }
    }
}
