use std::collections::HashMap;

use crate::config::TetherConfig;
use crate::core::temporal::{self, DueWindow};
use crate::document::PageStore;
use crate::outline::anchor;
use crate::outline::writer::{CHECKED_MARKER, UNCHECKED_MARKER};
use crate::report::Reporter;

use super::service::{ListQuery, TaskService};
use super::{MAX_RESULTS, SyncError};

/// Trailing window, in days, of the batched status listing.
pub const RECONCILE_WINDOW_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Lines whose checkbox was rewritten.
    pub updated: usize,
    /// Task lines whose remote status already matched.
    pub unchanged: usize,
    /// Anchored ids no listing or lookup could identify.
    pub unidentified: usize,
}

/// Rewrites the checkbox markers of a page's task lines to match remote
/// completion state.
pub struct StatusReconciler<'a, S: TaskService> {
    service: &'a S,
    store: &'a mut dyn PageStore,
    config: &'a TetherConfig,
    reporter: &'a dyn Reporter,
    task_list: String,
}

impl<'a, S: TaskService> StatusReconciler<'a, S> {
    pub fn new(
        service: &'a S,
        store: &'a mut dyn PageStore,
        config: &'a TetherConfig,
        reporter: &'a dyn Reporter,
        task_list: impl Into<String>,
    ) -> Self {
        Self {
            service,
            store,
            config,
            reporter,
            task_list: task_list.into(),
        }
    }

    /// Pull remote completion state and rewrite every task line's leading
    /// checkbox to match, leaving the rest of each line untouched.
    ///
    /// One batched listing over a trailing window supplies most statuses;
    /// ids missing from it fall back to single lookups until the first
    /// connectivity failure, after which the fallback stays off for the
    /// rest of the run. Unidentifiable ids are counted and reported, never
    /// fatal.
    pub fn sync_bullets_from_server(&mut self) -> Result<ReconcileOutcome, SyncError> {
        let today = temporal::today();
        let window = DueWindow::trailing_days(RECONCILE_WINDOW_DAYS, today);
        let query = ListQuery {
            task_list: self.task_list.clone(),
            due_min: window.min,
            due_max: Some(window.max),
            show_completed: true,
            max_results: MAX_RESULTS,
        };
        let listed = match self.service.list(&query) {
            Ok(items) => items,
            Err(e) => {
                self.reporter
                    .info(&format!("Error in communication with the task service: {}", e));
                return Err(e.into());
            }
        };
        let mut known: HashMap<String, bool> = HashMap::new();
        for task in listed {
            if let Some(id) = task.id {
                known.insert(id, task.status.is_completed());
            }
        }

        let lines = self.store.dump(&self.config.page)?;
        let mut outcome = ReconcileOutcome::default();
        let mut fallback_open = true;
        let mut content = String::with_capacity(lines.iter().map(String::len).sum());

        for line in &lines {
            let Some((id, checked)) = anchor::parse_task_line(line) else {
                content.push_str(line);
                continue;
            };
            let completed = match known.get(&id) {
                Some(&completed) => Some(completed),
                None if fallback_open => match self.service.get(&self.task_list, &id) {
                    Ok(task) => Some(task.status.is_completed()),
                    Err(e) if e.is_connectivity() => {
                        // First connectivity failure disables further
                        // single lookups for this run.
                        log::warn!("Status lookup failed, disabling fallback: {}", e);
                        fallback_open = false;
                        None
                    }
                    Err(e) => {
                        log::debug!("Could not identify task {}: {}", id, e);
                        None
                    }
                },
                None => None,
            };
            match completed {
                Some(completed) if completed != checked => {
                    let marker = if completed {
                        CHECKED_MARKER
                    } else {
                        UNCHECKED_MARKER
                    };
                    content.push_str(marker);
                    content.push_str(&line[UNCHECKED_MARKER.len()..]);
                    outcome.updated += 1;
                }
                Some(_) => {
                    content.push_str(line);
                    outcome.unchanged += 1;
                }
                None => {
                    content.push_str(line);
                    outcome.unidentified += 1;
                }
            }
        }

        if outcome.updated > 0 {
            self.store.store(&self.config.page, &content)?;
        }
        self.reporter.info(&format!(
            "Checkboxes synced: {} updated, {} unidentified.",
            outcome.updated, outcome.unidentified
        ));
        Ok(outcome)
    }
}
