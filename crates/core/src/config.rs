use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root directory for logs and persisted state.
///
/// `SOLSCOPE_HOME` overrides the default `~/.solscope`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SOLSCOPE_HOME") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".solscope")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    /// Pause after each dequeued change so bursts of writes settle.
    pub settle_delay_ms: u64,
    /// Idle window after which the built tree is rebuilt on next read.
    pub cache_ttl_secs: u64,
    /// Watcher-loop debounce before raw events reach the change queue.
    pub debounce_ms: u64,
    /// Directory names never listed or scanned.
    pub excluded_dirs: Vec<String>,
    /// File names always hidden at a project root.
    pub skipped_root_files: Vec<String>,
    /// OS-owned directories a manifest path may never resolve into.
    pub denied_roots: Vec<PathBuf>,
    /// Extensions (without dot) recognized as project manifests.
    pub project_extensions: Vec<String>,
    pub max_concurrent_requests: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 50,
            cache_ttl_secs: 300,
            debounce_ms: 200,
            excluded_dirs: [
                "bin",
                "obj",
                ".git",
                ".vs",
                ".idea",
                "node_modules",
                "packages",
                "TestResults",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            skipped_root_files: [".DS_Store", "Thumbs.db", "desktop.ini"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            denied_roots: [
                "/proc", "/sys", "/dev", "/etc", "/usr", "/bin", "/sbin", "/boot", "/lib",
                "/lib64", "/var/run",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            project_extensions: ["csproj", "fsproj", "vbproj"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_concurrent_requests: 4,
        }
    }
}

impl TreeConfig {
    /// Loads a JSON config file; missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(1))
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    pub fn is_skipped_root_file(&self, name: &str) -> bool {
        self.skipped_root_files.iter().any(|f| f == name)
    }

    pub fn is_project_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.project_extensions
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
