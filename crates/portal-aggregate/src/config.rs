use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Aggregation tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Per-instance read timeout in milliseconds.
    pub read_timeout_ms: u64,
    /// Fail the whole fetch when any single instance fails.
    pub all_or_nothing: bool,
}

impl AggregateConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 5_000,
            all_or_nothing: false,
        }
    }
}
