// Cluster Compactor Infrastructure - System Adapters
// Implements: CompactionExecutor

pub mod command_executor;

pub use command_executor::{CommandExecutor, CommandTemplate};
