// Port Layer - Interfaces for external dependencies

pub mod compaction_executor;
pub mod id_provider; // For deterministic testing
pub mod time_provider;

// Re-exports
pub use compaction_executor::{
    CompactionExecutor, ExecutionError, ExecutionResult, ExecutionStatus,
};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
