// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Reserve was called for a server that never had work enqueued
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    /// Strict admission refused a reservation
    #[error("Capacity exceeded: {busy} of {max} servers busy")]
    CapacityExceeded { busy: usize, max: usize },

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
