pub mod cache;
pub mod fake;
pub mod reconcile;
pub mod service;
pub mod submit;

use std::collections::HashSet;

use chrono::Duration;
use thiserror::Error;

use crate::config::TetherConfig;
use crate::core::temporal::{self, DueWindow};
use crate::document::{DocumentError, Editor, PageStore};
use crate::outline::writer;
use crate::report::Reporter;

use cache::ImportCache;
use service::{DEFAULT_TASK_LIST, ListQuery, ServiceError, TaskService};

/// Upper bound on items requested per listing call.
pub const MAX_RESULTS: usize = 99;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("cache write failed: {0}")]
    Cache(#[from] std::io::Error),
    #[error("task list '{0}' not found")]
    TaskListNotFound(String),
}

/// What one `fetch` pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Items returned by the listing call.
    pub fetched: usize,
    /// Items rendered and inserted into the page.
    pub inserted: usize,
    /// Items skipped because their fingerprint was already seen.
    pub skipped: usize,
    /// The throttle suppressed the fetch entirely.
    pub throttled: bool,
}

/// Pulls new remote tasks into one outline page and remembers what it has
/// already imported.
///
/// One engine instance is bound to one document store; its import cache is
/// keyed by the store's name and is not meant to be shared with another
/// engine.
pub struct SyncEngine<'a, S: TaskService> {
    service: &'a S,
    store: &'a mut dyn PageStore,
    config: &'a TetherConfig,
    reporter: &'a dyn Reporter,
    cache: Option<ImportCache>,
}

impl<'a, S: TaskService> SyncEngine<'a, S> {
    pub fn new(
        service: &'a S,
        store: &'a mut dyn PageStore,
        config: &'a TetherConfig,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            service,
            store,
            config,
            reporter,
            cache: None,
        }
    }

    /// Fetch new tasks and insert them into the target page.
    ///
    /// Unless `force`, a fetch within the throttle window that has not
    /// crossed a midnight boundary is a no-op. `all_history` refetches
    /// every task regardless of due date (and implies `force`), starting
    /// from an empty fingerprint view.
    ///
    /// The cache snapshot is only rewritten after the page content has been
    /// stored, so an interrupted pass leaves the previous consistent state
    /// behind and the next run re-filters the same window.
    pub fn fetch(
        &mut self,
        mut editor: Option<&mut dyn Editor>,
        force: bool,
        all_history: bool,
    ) -> Result<FetchOutcome, SyncError> {
        let force = force || all_history;
        self.ensure_cache();
        let today = temporal::today();

        let cache = self.cache.as_mut().expect("cache loaded above");
        if !force {
            if let Some(last) = cache.last_sync() {
                let within_window =
                    temporal::now() - last < Duration::hours(self.config.throttle_hours as i64);
                if within_window && last.date() == today {
                    log::debug!("Throttled: last sync at {}", last);
                    return Ok(FetchOutcome {
                        throttled: true,
                        ..FetchOutcome::default()
                    });
                }
            }
        }

        let window = if all_history {
            DueWindow::unbounded(today)
        } else if cache.was_persisted() {
            let since = cache.last_sync().map(|t| t.date()).unwrap_or(today);
            DueWindow::since_day(since, today)
        } else {
            DueWindow::since_day(today, today)
        };

        let task_list = self.resolve_task_list()?;

        let query = ListQuery {
            task_list,
            due_min: window.min,
            due_max: Some(window.max),
            show_completed: all_history,
            max_results: MAX_RESULTS,
        };
        let items = match self.service.list(&query) {
            Ok(items) => items,
            Err(e) => {
                // Unreachable service and an empty listing are the same
                // "no items" outcome; the next trigger retries.
                log::warn!("Listing tasks failed: {}", e);
                Vec::new()
            }
        };
        if items.is_empty() {
            self.reporter.info("No tasks found.");
            let cache = self.cache.as_mut().expect("cache loaded above");
            if cache.was_persisted() {
                cache.touch()?;
            }
            return Ok(FetchOutcome::default());
        }

        // The fingerprint view is kept local until the persist step, so an
        // interrupted pass never leaves a half-updated cache behind.
        // `all_history` starts from an empty view: every fingerprint is
        // re-collected from what actually gets rendered.
        let cache = self.cache.as_mut().expect("cache loaded above");
        let already_seen: HashSet<String> = if all_history {
            HashSet::new()
        } else {
            cache.fingerprints().clone()
        };
        let mut next_seen: HashSet<String> = HashSet::new();
        let mut block = String::new();
        let mut outcome = FetchOutcome {
            fetched: items.len(),
            ..FetchOutcome::default()
        };
        for item in &items {
            let Some(etag) = item.etag.as_deref() else {
                log::error!("Skipping task without etag: {}", item.title);
                continue;
            };
            if already_seen.contains(etag) {
                // Still-due items keep their fingerprint alive so a later
                // pass still knows them; either way the text is not
                // re-inserted.
                if item.is_still_due(today) {
                    next_seen.insert(etag.to_string());
                }
                log::debug!("Skipping {}", item.title);
                outcome.skipped += 1;
                continue;
            }
            match writer::render_task(item, self.config.due_annotation) {
                Ok(text) => {
                    next_seen.insert(etag.to_string());
                    block.push_str(&text);
                    block.push('\n');
                    outcome.inserted += 1;
                }
                Err(e) => {
                    log::error!("Skipping task: {}", e);
                }
            }
        }
        self.reporter.info(&format!(
            "New tasks: {}, page: {}",
            outcome.inserted, self.config.page
        ));

        if block.is_empty() {
            if cache.was_persisted() {
                cache.touch()?;
            }
            return Ok(outcome);
        }

        let lines = self.store.dump(&self.config.page)?;
        let (content, insert_offset) = insert_after_first_blank(&lines, &block);

        let bounds = match editor.as_deref() {
            Some(ed) if ed.page_name() == self.config.page => {
                Some(ed.selection().unwrap_or_else(|| (ed.caret(), ed.caret())))
            }
            _ => None,
        };

        self.store.store(&self.config.page, &content)?;

        if let (Some(ed), Some((start, end))) = (editor.as_deref_mut(), bounds) {
            // Shift offsets sitting at or past the insertion point by the
            // block length; no content diffing.
            let shift = block.chars().count();
            let translate = |o: usize| if o >= insert_offset { o + shift } else { o };
            ed.select_range(translate(start), translate(end));
        }

        let cache = self.cache.as_mut().expect("cache loaded above");
        cache.replace_fingerprints(next_seen);
        cache.touch()?;
        Ok(outcome)
    }

    /// Re-read the task-list name-to-id map from the service and persist
    /// it. This is the only operation that populates the map.
    pub fn refresh_task_lists(&mut self) -> Result<usize, SyncError> {
        self.ensure_cache();
        let lists = self.service.list_task_lists()?;
        let cache = self.cache.as_mut().expect("cache loaded above");
        cache.set_task_lists(&lists);
        cache.save()?;
        self.reporter
            .info(&format!("Discovered {} task lists.", lists.len()));
        Ok(lists.len())
    }

    fn ensure_cache(&mut self) {
        if self.cache.is_none() {
            let path = self.config.cache_path(self.store.name());
            self.cache = Some(ImportCache::load(path));
        }
    }

    fn resolve_task_list(&mut self) -> Result<String, SyncError> {
        if self.config.task_list.is_empty() {
            return Ok(DEFAULT_TASK_LIST.to_string());
        }
        if let Some(id) = self.cached_task_list_id() {
            return Ok(id);
        }
        self.refresh_task_lists()?;
        if let Some(id) = self.cached_task_list_id() {
            return Ok(id);
        }
        self.reporter
            .info(&format!("Task list '{}' not found.", self.config.task_list));
        Err(SyncError::TaskListNotFound(self.config.task_list.clone()))
    }

    fn cached_task_list_id(&self) -> Option<String> {
        self.cache
            .as_ref()
            .and_then(|c| c.task_list_id(&self.config.task_list))
    }
}

/// Insert `block` immediately after the first blank line of the dumped
/// page, or append it when no blank line exists. Returns the new content
/// and the char offset the block was inserted at.
fn insert_after_first_blank(lines: &[String], block: &str) -> (String, usize) {
    let mut content = String::new();
    let mut insert_at: Option<usize> = None;
    for line in lines {
        content.push_str(line);
        if insert_at.is_none() && line.trim().is_empty() {
            insert_at = Some(content.chars().count());
            content.push_str(block);
        }
    }
    let offset = match insert_at {
        Some(offset) => offset,
        None => {
            let offset = content.chars().count();
            content.push_str(block);
            offset
        }
    };
    (content, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{Task, TaskStatus};
    use crate::document::buffer::{BufferEditor, MemoryNotebook};
    use crate::outline::writer::render_task;
    use crate::report::MemoryReporter;
    use crate::sync::fake::FakeTaskService;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> TetherConfig {
        TetherConfig {
            cache_dir: dir.path().to_path_buf(),
            ..TetherConfig::default()
        }
    }

    fn notebook_with_home() -> MemoryNotebook {
        let mut notebook = MemoryNotebook::new("notes");
        notebook.set_page("Home", "Title\n\nOld note\n");
        notebook
    }

    fn due_task(title: &str, etag: &str, due_in_days: i64) -> Task {
        let mut task = Task::new(title);
        task.etag = Some(etag.to_string());
        task.due = (temporal::today() + Duration::days(due_in_days)).and_hms_opt(8, 0, 0);
        task
    }

    /// Pre-seed a cache file with fingerprints and a last-sync timestamp
    /// some days back, pinning the on-disk format at the same time.
    fn seed_cache_file(config: &TetherConfig, fingerprints: &[&str], days_ago: i64) {
        let etags: Vec<String> = fingerprints.iter().map(|e| format!("\"{}\"", e)).collect();
        let last = (temporal::today() - Duration::days(days_ago)).format("%Y-%m-%d");
        let content = format!(
            r#"{{"seen_fingerprints":[{}],"task_list_map":{{}},"last_sync":"{}T00:00:00"}}"#,
            etags.join(","),
            last
        );
        fs::create_dir_all(&config.cache_dir).unwrap();
        fs::write(config.cache_path("notes"), content).unwrap();
    }

    #[test]
    fn first_run_imports_and_persists_fingerprints() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        let stored = fake.seed_task(due_task("Buy milk", "e-milk", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        let outcome = engine.fetch(None, false, false).unwrap();

        assert_eq!(outcome.inserted, 1);
        let expected_line = format!(
            "[ ] [[gtasks://{}|⚑]] Buy milk",
            stored.id.as_deref().unwrap()
        );
        assert!(notebook.page("Home").unwrap().contains(&expected_line));

        let cache = ImportCache::load(config.cache_path("notes"));
        assert!(cache.contains_fingerprint("e-milk"));
        assert!(cache.last_sync().is_some());
        assert!(
            reporter
                .messages()
                .iter()
                .any(|m| m.contains("New tasks: 1"))
        );
    }

    #[test]
    fn block_lands_after_first_blank_line() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        let stored = fake.seed_task(due_task("Task X", "e-x", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        SyncEngine::new(&fake, &mut notebook, &config, &reporter)
            .fetch(None, false, false)
            .unwrap();

        let rendered = render_task(&stored, false).unwrap();
        let expected = format!("Title\n\n{}\nOld note\n", rendered);
        assert_eq!(notebook.page("Home").unwrap(), expected);
    }

    #[test]
    fn block_appended_when_no_blank_line() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        let stored = fake.seed_task(due_task("Task X", "e-x", 0));
        let mut notebook = MemoryNotebook::new("notes");
        notebook.set_page("Home", "Title\nOld note\n");
        let reporter = MemoryReporter::new();

        SyncEngine::new(&fake, &mut notebook, &config, &reporter)
            .fetch(None, false, false)
            .unwrap();

        let rendered = render_task(&stored, false).unwrap();
        let expected = format!("Title\nOld note\n{}\n", rendered);
        assert_eq!(notebook.page("Home").unwrap(), expected);
    }

    #[test]
    fn second_fetch_within_window_is_throttled() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        fake.seed_task(due_task("Buy milk", "e-milk", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        engine.fetch(None, false, false).unwrap();
        assert_eq!(fake.list_calls(), 1);

        let outcome = engine.fetch(None, false, false).unwrap();
        assert!(outcome.throttled);
        assert_eq!(fake.list_calls(), 1);
    }

    #[test]
    fn forced_fetch_bypasses_throttle() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        fake.seed_task(due_task("Buy milk", "e-milk", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        engine.fetch(None, false, false).unwrap();
        engine.fetch(None, true, false).unwrap();
        assert_eq!(fake.list_calls(), 2);
    }

    #[test]
    fn seen_fingerprint_with_past_due_is_dropped() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        seed_cache_file(&config, &["e-A"], 3);

        let fake = FakeTaskService::new();
        fake.seed_task(due_task("Old chore", "e-A", -1));
        fake.seed_task(due_task("New chore", "e-B", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        let outcome = engine.fetch(None, false, false).unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped, 1);
        let page = notebook.page("Home").unwrap();
        assert!(page.contains("New chore"));
        assert!(!page.contains("Old chore"));

        let cache = ImportCache::load(config.cache_path("notes"));
        assert!(cache.contains_fingerprint("e-B"));
        assert!(!cache.contains_fingerprint("e-A"));
    }

    #[test]
    fn seen_fingerprint_still_due_is_retained_but_not_reinserted() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        seed_cache_file(&config, &["e-A"], 3);

        let fake = FakeTaskService::new();
        fake.seed_task(due_task("Old chore", "e-A", 1));
        fake.seed_task(due_task("New chore", "e-B", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        engine.fetch(None, false, false).unwrap();

        assert!(!notebook.page("Home").unwrap().contains("Old chore"));
        let cache = ImportCache::load(config.cache_path("notes"));
        assert!(cache.contains_fingerprint("e-A"));
        assert!(cache.contains_fingerprint("e-B"));
    }

    #[test]
    fn all_history_clears_fingerprints_and_reimports() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        seed_cache_file(&config, &["e-A"], 3);

        let fake = FakeTaskService::new();
        fake.seed_task(due_task("Old chore", "e-A", -10));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        let outcome = engine.fetch(None, false, true).unwrap();

        assert_eq!(outcome.inserted, 1);
        assert!(notebook.page("Home").unwrap().contains("Old chore"));
        let cache = ImportCache::load(config.cache_path("notes"));
        assert!(cache.contains_fingerprint("e-A"));
    }

    #[test]
    fn no_items_leaves_missing_cache_missing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        let outcome = engine.fetch(None, false, false).unwrap();

        assert_eq!(outcome.fetched, 0);
        assert!(!config.cache_path("notes").exists());
        assert_eq!(notebook.page("Home").unwrap(), "Title\n\nOld note\n");
        assert!(
            reporter
                .messages()
                .iter()
                .any(|m| m.contains("No tasks found."))
        );
    }

    #[test]
    fn no_items_touches_existing_cache() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        seed_cache_file(&config, &["e-A"], 3);
        let fake = FakeTaskService::new();
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        engine.fetch(None, true, false).unwrap();

        let cache = ImportCache::load(config.cache_path("notes"));
        assert!(cache.contains_fingerprint("e-A"));
        assert!(cache.last_sync().unwrap().date() == temporal::today());
    }

    #[test]
    fn unreachable_service_is_no_items() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        seed_cache_file(&config, &["e-A"], 3);
        let fake = FakeTaskService::new();
        fake.set_unreachable(true);
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        let outcome = engine.fetch(None, true, false).unwrap();
        assert_eq!(outcome.fetched, 0);
        assert_eq!(notebook.page("Home").unwrap(), "Title\n\nOld note\n");
    }

    #[test]
    fn named_task_list_resolves_through_refresh() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.task_list = "Work".to_string();
        let fake = FakeTaskService::new();
        fake.add_list("Work", "list-work");
        fake.seed_task(due_task("Ship it", "e-ship", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        let outcome = engine.fetch(None, false, false).unwrap();

        assert_eq!(outcome.inserted, 1);
        let cache = ImportCache::load(config.cache_path("notes"));
        assert_eq!(cache.task_list_id("Work").as_deref(), Some("list-work"));
    }

    #[test]
    fn unknown_task_list_fails_and_reports() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.task_list = "Nope".to_string();
        let fake = FakeTaskService::new();
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        let result = engine.fetch(None, false, false);

        assert!(matches!(result, Err(SyncError::TaskListNotFound(_))));
        assert!(
            reporter
                .messages()
                .iter()
                .any(|m| m.contains("Task list 'Nope' not found."))
        );
    }

    #[test]
    fn caret_past_insertion_point_is_shifted() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        let stored = fake.seed_task(due_task("Task X", "e-x", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        // "Title\n\n" is 7 chars; caret inside "Old note".
        let mut editor = BufferEditor::new("Home", "Title\n\nOld note\n");
        editor.set_caret(9);

        SyncEngine::new(&fake, &mut notebook, &config, &reporter)
            .fetch(Some(&mut editor), false, false)
            .unwrap();

        let block_len = render_task(&stored, false).unwrap().chars().count() + 1;
        assert_eq!(editor.selection(), Some((9 + block_len, 9 + block_len)));
    }

    #[test]
    fn caret_before_insertion_point_stays_put() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        fake.seed_task(due_task("Task X", "e-x", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut editor = BufferEditor::new("Home", "Title\n\nOld note\n");
        editor.set_caret(3);

        SyncEngine::new(&fake, &mut notebook, &config, &reporter)
            .fetch(Some(&mut editor), false, false)
            .unwrap();

        assert_eq!(editor.selection(), Some((3, 3)));
    }

    #[test]
    fn editor_on_other_page_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        fake.seed_task(due_task("Task X", "e-x", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut editor = BufferEditor::new("Journal", "elsewhere\n");
        editor.set_caret(3);

        SyncEngine::new(&fake, &mut notebook, &config, &reporter)
            .fetch(Some(&mut editor), false, false)
            .unwrap();

        assert_eq!(editor.selection(), None);
    }

    #[test]
    fn titleless_task_is_skipped_without_fingerprint() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        fake.seed_task(due_task("", "e-bad", 0));
        fake.seed_task(due_task("Good task", "e-good", 0));
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        let outcome = engine.fetch(None, false, false).unwrap();

        assert_eq!(outcome.inserted, 1);
        let cache = ImportCache::load(config.cache_path("notes"));
        assert!(cache.contains_fingerprint("e-good"));
        assert!(!cache.contains_fingerprint("e-bad"));
    }

    #[test]
    fn completed_status_renders_checked_marker() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let fake = FakeTaskService::new();
        let mut done = due_task("Already done", "e-done", -2);
        done.status = TaskStatus::Completed;
        fake.seed_task(done);
        let mut notebook = notebook_with_home();
        let reporter = MemoryReporter::new();

        let mut engine = SyncEngine::new(&fake, &mut notebook, &config, &reporter);
        engine.fetch(None, false, true).unwrap();

        assert!(notebook.page("Home").unwrap().contains("[*] [[gtasks://"));
    }

    #[test]
    fn insert_after_first_blank_prefers_first_gap() {
        let lines: Vec<String> = ["a\n", "\n", "b\n", "\n", "c\n"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (content, offset) = insert_after_first_blank(&lines, "X\n");
        assert_eq!(content, "a\n\nX\nb\n\nc\n");
        assert_eq!(offset, 3);
    }

    #[test]
    fn insert_appends_to_empty_page() {
        let (content, offset) = insert_after_first_blank(&[], "X\n");
        assert_eq!(content, "X\n");
        assert_eq!(offset, 0);
    }
}
