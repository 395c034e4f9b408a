use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::temporal;

use super::service::TaskListEntry;

/// Persistent per-document record of what has already been imported: the
/// etag fingerprints rendered into the page, the discovered task-list
/// name-to-id map, and the last successful sync time.
///
/// Single-writer by design; there is no file locking.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImportCache {
    seen_fingerprints: HashSet<String>,
    task_list_map: HashMap<String, String>,
    last_sync: Option<NaiveDateTime>,
    #[serde(skip)]
    path: PathBuf,
    #[serde(skip)]
    persisted: bool,
}

impl ImportCache {
    /// Read the cache file at `path`. A missing file is the expected
    /// first-run state and yields an empty cache; an unreadable or
    /// malformed file is logged and also starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut cache = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(mut cache) => {
                    cache.persisted = true;
                    cache
                }
                Err(e) => {
                    log::warn!("Discarding malformed cache file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("Could not read cache file {}: {}", path.display(), e);
                Self::default()
            }
        };
        cache.path = path;
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a persisted cache file existed when this cache was loaded
    /// (or has been written since).
    pub fn was_persisted(&self) -> bool {
        self.persisted
    }

    pub fn last_sync(&self) -> Option<NaiveDateTime> {
        self.last_sync
    }

    pub fn contains_fingerprint(&self, etag: &str) -> bool {
        self.seen_fingerprints.contains(etag)
    }

    pub fn fingerprints(&self) -> &HashSet<String> {
        &self.seen_fingerprints
    }

    pub fn replace_fingerprints(&mut self, fingerprints: HashSet<String>) {
        self.seen_fingerprints = fingerprints;
    }

    pub fn task_list_id(&self, name: &str) -> Option<String> {
        self.task_list_map.get(name).cloned()
    }

    pub fn set_task_lists(&mut self, entries: &[TaskListEntry]) {
        self.task_list_map = entries
            .iter()
            .map(|e| (e.title.clone(), e.id.clone()))
            .collect();
    }

    /// Write the cache to its file. The sync time is left alone; only
    /// [`ImportCache::touch`] advances it.
    pub fn save(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)?;
        self.persisted = true;
        Ok(())
    }

    /// Stamp the sync time and write, so the throttle keeps counting from a
    /// fetch cycle even when it found nothing new.
    pub fn touch(&mut self) -> io::Result<()> {
        self.last_sync = Some(temporal::now());
        self.save()
    }
}
