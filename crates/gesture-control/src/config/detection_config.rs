use crate::config::{default_operation_timeout_ms, default_stop_timeout_ms};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds on detection session operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// How long stop waits for the frame producer to exit.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Upper bound for blocking session and storage operations.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl DetectionConfig {
    pub(crate) fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub(crate) fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}
