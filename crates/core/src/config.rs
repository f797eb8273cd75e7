// Compactor configuration

use crate::application::compactor::constants::{
    DEFAULT_MAX_CONCURRENT_SERVERS, DEFAULT_POLL_INTERVAL_MS,
};
use crate::domain::AdmissionMode;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one compaction campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactorConfig {
    /// Maximum number of servers compacting at the same time
    pub max_concurrent_servers: usize,
    /// How long an idle worker waits before asking the table again
    pub poll_interval_ms: u64,
    pub admission: AdmissionMode,
    /// Log reservations without invoking the executor
    pub dry_run: bool,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_servers: DEFAULT_MAX_CONCURRENT_SERVERS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            admission: AdmissionMode::Permissive,
            dry_run: false,
        }
    }
}

impl CompactorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_servers == 0 {
            return Err(AppError::Config(
                "max_concurrent_servers must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
