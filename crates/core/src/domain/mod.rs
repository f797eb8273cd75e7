// Domain Layer - Queue table and compaction entities

pub mod error;
pub mod queue;
pub mod request;
pub mod server;

// Re-exports
pub use error::DomainError;
pub use queue::{AdmissionMode, ClusterCompactionQueues, QueueStats, QueueTable};
pub use request::CompactionRequest;
pub use server::ServerName;
