use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sync engine tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-instance timeout for fetching the stored copy, in milliseconds.
    pub read_timeout_ms: u64,
    /// Per-instance timeout for a write, in milliseconds. A write that
    /// exceeds it is reported as failed for that instance.
    pub write_timeout_ms: u64,
    /// Reject a second concurrent sync of the same (user, entity) with
    /// `SyncInProgress`. When `false` the second call waits its turn.
    pub reject_concurrent: bool,
}

impl SyncConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
            reject_concurrent: true,
        }
    }
}
