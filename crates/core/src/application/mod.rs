// Application Layer - Campaign coordination

pub mod compactor;

// Re-exports
pub use compactor::{
    shutdown_channel, CampaignSummary, Compactor, DispatchOutcome, FailedCompaction,
    ShutdownSender, ShutdownToken,
};
