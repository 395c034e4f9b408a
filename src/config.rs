use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default minimum hours between non-forced fetches.
pub const THROTTLE_HOURS: u64 = 3;

fn default_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("tether")
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TetherConfig {
    /// Page new tasks are inserted into.
    pub page: String,
    /// Display name of the remote task list; empty means the service's
    /// default list.
    pub task_list: String,
    /// Fetch new tasks when the host starts up.
    pub startup_fetch: bool,
    /// Extract and emit trailing `>YYYY-MM-DD` due annotations in titles.
    pub due_annotation: bool,
    pub throttle_hours: u64,
    /// Directory holding the per-document import caches.
    pub cache_dir: PathBuf,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            page: "Home".to_string(),
            task_list: String::new(),
            startup_fetch: true,
            due_annotation: false,
            throttle_hours: THROTTLE_HOURS,
            cache_dir: default_cache_dir(),
        }
    }
}

impl TetherConfig {
    /// Import-cache file for one document store, keyed by its name.
    pub fn cache_path(&self, notebook: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.cache.json", notebook))
    }

    pub fn ensure_cache_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)
    }
}
