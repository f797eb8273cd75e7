// Compaction Core - Queue Table, Coordinator & Ports
// NO process or CLI dependencies

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::CompactorConfig;
pub use error::{AppError, Result};
