//! Storage core configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the storage core: data locations, page geometry
/// and session pool limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root data directory; the log and store files live beneath it.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Page size in bytes for every store file (default: 4096).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum number of concurrently checked-out sessions (default: 10).
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Bound on how long a session request may wait, in milliseconds
    /// (default: 30000). Exceeding it fails the request rather than
    /// blocking indefinitely.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_page_size() -> usize {
    4096
}

fn default_max_sessions() -> usize {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            page_size: default_page_size(),
            max_sessions: default_max_sessions(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl StorageConfig {
    /// A config rooted at `data_dir`, defaults elsewhere.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    /// The bounded session acquisition wait.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}
