use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Path of the sled volume storing notification data
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Retention time in seconds after which stored notifications are purged
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Interval in seconds between garbage collection cycles
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            retention_secs: default_retention_secs(),
            gc_interval_secs: default_gc_interval_secs(),
        }
    }
}

impl StorageConfig {
    /// Validates storage configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when the path is empty or a period is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("storage.path cannot be empty".into()));
        }
        if self.retention_secs == 0 {
            return Err(Error::InvalidConfig(
                "storage.retention_secs must be greater than 0".into(),
            ));
        }
        if self.gc_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "storage.gc_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("notifications.db")
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_gc_interval_secs() -> u64 {
    10 * 60
}
