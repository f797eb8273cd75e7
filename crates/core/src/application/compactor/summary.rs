// Campaign outcome accounting

use crate::domain::ServerName;
use serde::{Deserialize, Serialize};

/// A compaction that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCompaction {
    pub server: ServerName,
    pub region: String,
    pub reason: String,
}

/// What happened to one reserved request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Succeeded {
        server: ServerName,
        region: String,
        duration_ms: i64,
    },
    Failed(FailedCompaction),
}

/// Per-worker tally, merged into the campaign summary at the end
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub succeeded: usize,
    pub failed: Vec<FailedCompaction>,
}

impl Tally {
    pub fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Succeeded { .. } => self.succeeded += 1,
            DispatchOutcome::Failed(failure) => self.failed.push(failure),
        }
    }

    pub fn merge(&mut self, other: Tally) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
    }
}

/// Result of one campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: String,
    pub succeeded: usize,
    pub failed: Vec<FailedCompaction>,
    /// Requests still queued when the campaign stopped
    pub remaining: usize,
    pub elapsed_ms: i64,
    pub dry_run: bool,
}

impl CampaignSummary {
    /// Every request was dispatched and none failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.remaining == 0
    }
}
