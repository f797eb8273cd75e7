// Compaction Executor Port
// Abstraction for running one compaction request against its server

use crate::domain::CompactionRequest;
use async_trait::async_trait;
use thiserror::Error;

/// Result of running one compaction
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ExecutionResult {
    pub fn success(duration_ms: i64) -> Self {
        Self {
            status: ExecutionStatus::Success,
            duration_ms,
            exit_code: Some(0),
            stdout: None,
            stderr: None,
        }
    }
}

/// Execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed,
    Timeout,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Compaction timeout after {0}ms")]
    Timeout(i64),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Runs a compaction request against the server that hosts its region.
///
/// Implementations:
/// - CommandExecutor (infra-system): runs an operator-supplied command
/// - mocks::MockCompactionExecutor: in-memory, for tests
///
/// The coordinator guarantees a server is never handed two requests at once.
#[async_trait]
pub trait CompactionExecutor: Send + Sync {
    /// Run the compaction and wait for it to finish
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the compaction could not be started
    /// - ExecutionError::Timeout if it did not finish in time
    /// - ExecutionError::InvalidRequest if the request cannot be expressed
    async fn compact(&self, request: &CompactionRequest)
        -> Result<ExecutionResult, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ServerName;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Succeed after sleeping
        Delay(Duration),
        /// Always fail with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    #[derive(Default)]
    struct Tracking {
        calls: usize,
        executed: Vec<CompactionRequest>,
        in_flight: HashMap<ServerName, usize>,
        max_in_flight_per_server: usize,
        total_in_flight: usize,
        max_in_flight: usize,
    }

    /// Mock Compaction Executor for testing.
    ///
    /// Records every request and the peak number of overlapping compactions,
    /// both per server and overall.
    pub struct MockCompactionExecutor {
        behavior: MockBehavior,
        failing_regions: HashSet<String>,
        tracking: Mutex<Tracking>,
    }

    impl MockCompactionExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                failing_regions: HashSet::new(),
                tracking: Mutex::new(Tracking::default()),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_delayed(delay: Duration) -> Self {
            Self::new(MockBehavior::Delay(delay))
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        /// Fail only the given region, whatever the base behavior
        pub fn with_failing_region(mut self, region: impl Into<String>) -> Self {
            self.failing_regions.insert(region.into());
            self
        }

        pub fn call_count(&self) -> usize {
            self.tracking.lock().unwrap().calls
        }

        pub fn executed(&self) -> Vec<CompactionRequest> {
            self.tracking.lock().unwrap().executed.clone()
        }

        pub fn max_in_flight(&self) -> usize {
            self.tracking.lock().unwrap().max_in_flight
        }

        pub fn max_in_flight_per_server(&self) -> usize {
            self.tracking.lock().unwrap().max_in_flight_per_server
        }

        fn enter(&self, request: &CompactionRequest) {
            let mut t = self.tracking.lock().unwrap();
            t.calls += 1;
            t.executed.push(request.clone());
            t.total_in_flight += 1;
            t.max_in_flight = t.max_in_flight.max(t.total_in_flight);
            let per_server = {
                let n = t.in_flight.entry(request.server.clone()).or_insert(0);
                *n += 1;
                *n
            };
            t.max_in_flight_per_server = t.max_in_flight_per_server.max(per_server);
        }

        fn exit(&self, request: &CompactionRequest) {
            let mut t = self.tracking.lock().unwrap();
            t.total_in_flight -= 1;
            if let Some(n) = t.in_flight.get_mut(&request.server) {
                *n -= 1;
            }
        }
    }

    /// Counts a compaction as in flight until dropped, so cancelled and
    /// panicking calls are tracked too
    struct InFlight<'a> {
        executor: &'a MockCompactionExecutor,
        request: &'a CompactionRequest,
    }

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.executor.exit(self.request);
        }
    }

    #[async_trait]
    impl CompactionExecutor for MockCompactionExecutor {
        async fn compact(
            &self,
            request: &CompactionRequest,
        ) -> Result<ExecutionResult, ExecutionError> {
            self.enter(request);
            let _in_flight = InFlight {
                executor: self,
                request,
            };

            if self.failing_regions.contains(&request.region) {
                Err(ExecutionError::SpawnFailed(format!(
                    "region {} rejected",
                    request.region
                )))
            } else {
                match &self.behavior {
                    MockBehavior::Success => Ok(ExecutionResult::success(1)),
                    MockBehavior::Delay(delay) => {
                        tokio::time::sleep(*delay).await;
                        Ok(ExecutionResult::success(delay.as_millis() as i64))
                    }
                    MockBehavior::Fail(msg) => Err(ExecutionError::SpawnFailed(msg.clone())),
                    MockBehavior::Panic(msg) => panic!("{}", msg),
                }
            }
        }
    }

}
