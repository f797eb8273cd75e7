// Compactor - Campaign worker pool over the queue table

pub mod constants;
mod shutdown;
mod summary;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use summary::{CampaignSummary, DispatchOutcome, FailedCompaction};

use crate::config::CompactorConfig;
use crate::domain::{ClusterCompactionQueues, CompactionRequest, QueueTable, ServerName};
use crate::error::Result;
use crate::port::{CompactionExecutor, ExecutionStatus, IdProvider, TimeProvider};
use std::sync::Arc;
use summary::Tally;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Build an empty queue table sized and moded by `config`
pub fn queues_from_config(config: &CompactorConfig) -> Result<ClusterCompactionQueues> {
    config.validate()?;
    Ok(QueueTable::with_admission(
        config.max_concurrent_servers,
        config.admission,
    )?)
}

/// Releases the reserved server when dropped
struct Reservation {
    queues: Arc<ClusterCompactionQueues>,
    server: ServerName,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.queues.release(&self.server);
    }
}

/// Aborts the executor task if the dispatch waiting on it is dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drives one compaction campaign.
///
/// Spawns one worker per allowed concurrent server. Each worker reserves the
/// idle server with the largest backlog, hands its next request to the
/// executor, releases the server and repeats. The campaign ends when no work
/// is queued and no server is busy, or on shutdown.
#[derive(Clone)]
pub struct Compactor {
    queues: Arc<ClusterCompactionQueues>,
    /// `None` for a dry run
    executor: Option<Arc<dyn CompactionExecutor>>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    config: CompactorConfig,
}

impl Compactor {
    /// Compactor that hands requests to `executor`, unless `config.dry_run`
    /// is set.
    pub fn new(
        queues: Arc<ClusterCompactionQueues>,
        executor: Arc<dyn CompactionExecutor>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: CompactorConfig,
    ) -> Result<Self> {
        let executor = (!config.dry_run).then_some(executor);
        Self::build(queues, executor, time_provider, id_provider, config)
    }

    /// Compactor that only logs what it would compact
    pub fn dry_run(
        queues: Arc<ClusterCompactionQueues>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: CompactorConfig,
    ) -> Result<Self> {
        let config = CompactorConfig {
            dry_run: true,
            ..config
        };
        Self::build(queues, None, time_provider, id_provider, config)
    }

    fn build(
        queues: Arc<ClusterCompactionQueues>,
        executor: Option<Arc<dyn CompactionExecutor>>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: CompactorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            queues,
            executor,
            time_provider,
            id_provider,
            config,
        })
    }

    pub fn queues(&self) -> &Arc<ClusterCompactionQueues> {
        &self.queues
    }

    /// Run the campaign to completion or until `shutdown` fires.
    ///
    /// Workers finish their in-flight compaction before stopping; requests
    /// not yet dispatched are reported as `remaining`.
    pub async fn run(&self, shutdown: ShutdownToken) -> CampaignSummary {
        let campaign_id = self.id_provider.generate_id();
        let started_at = self.time_provider.now_millis();
        let stats = self.queues.stats();

        info!(
            campaign_id = %campaign_id,
            servers = stats.servers,
            pending = stats.pending,
            max_concurrent = stats.max_concurrent,
            admission = ?self.queues.admission(),
            dry_run = self.config.dry_run,
            "Compaction campaign started"
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.queues.max_concurrent() {
            let compactor = self.clone();
            let shutdown = shutdown.clone();
            let span = info_span!("worker", campaign_id = %campaign_id, worker_id);
            workers.spawn(compactor.worker_loop(shutdown).instrument(span));
        }

        let mut tally = Tally::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_tally) => tally.merge(worker_tally),
                Err(e) => error!(error = %e, "Compaction worker task failed"),
            }
        }

        let summary = CampaignSummary {
            campaign_id,
            succeeded: tally.succeeded,
            failed: tally.failed,
            remaining: self.queues.pending_count(),
            elapsed_ms: self.time_provider.now_millis() - started_at,
            dry_run: self.config.dry_run,
        };

        info!(
            campaign_id = %summary.campaign_id,
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            remaining = summary.remaining,
            elapsed_ms = summary.elapsed_ms,
            "Compaction campaign finished"
        );
        summary
    }

    async fn worker_loop(self, mut shutdown: ShutdownToken) -> Tally {
        let mut tally = Tally::default();
        loop {
            if shutdown.is_shutdown() {
                info!("Worker stopping on shutdown");
                break;
            }

            if let Some(outcome) = self.run_once().await {
                tally.record(outcome);
                continue;
            }

            if !self.queues.has_pending_work() && self.queues.busy_count() == 0 {
                debug!("No compactions left");
                break;
            }

            // Every server with work is busy, or we are at capacity
            tokio::select! {
                _ = sleep(self.config.poll_interval()) => {},
                _ = shutdown.wait() => {
                    info!("Worker interrupted while idle");
                    break;
                }
            }
        }
        tally
    }

    /// Reserve the best candidate and run one compaction on it.
    ///
    /// Returns `None` when nothing could be reserved (at capacity, or no idle
    /// server has work). If the returned future is dropped mid-compaction,
    /// the executor task is aborted and the server is released once that
    /// task has stopped.
    pub async fn run_once(&self) -> Option<DispatchOutcome> {
        let (server, request) = self.queues.reserve_next()?;
        let reservation = Reservation {
            queues: Arc::clone(&self.queues),
            server,
        };

        let outcome = match &self.executor {
            Some(executor) => Self::dispatch(Arc::clone(executor), reservation, request).await,
            None => {
                info!(
                    server = %reservation.server,
                    region = %request.region,
                    stores = %request.stores_csv(),
                    "Dry run: skipping compaction"
                );
                DispatchOutcome::Succeeded {
                    server: reservation.server.clone(),
                    region: request.region,
                    duration_ms: 0,
                }
            }
        };
        Some(outcome)
    }

    /// Run the executor in its own task so a panic is reported as a failed
    /// compaction instead of taking the worker down.
    async fn dispatch(
        executor: Arc<dyn CompactionExecutor>,
        reservation: Reservation,
        request: CompactionRequest,
    ) -> DispatchOutcome {
        let server = reservation.server.clone();
        info!(
            server = %server,
            region = %request.region,
            stores = %request.stores_csv(),
            "Starting compaction"
        );

        let request = Arc::new(request);
        let for_exec = Arc::clone(&request);
        // The task owns the reservation: the server stays busy until the
        // compaction itself has finished or been torn down.
        let mut task = AbortOnDrop(tokio::spawn(async move {
            let _reservation = reservation;
            executor.compact(&for_exec).await
        }));

        let failed = |reason: String| {
            DispatchOutcome::Failed(FailedCompaction {
                server: server.clone(),
                region: request.region.clone(),
                reason,
            })
        };

        match (&mut task.0).await {
            Ok(Ok(result)) if result.status == ExecutionStatus::Success => {
                info!(
                    server = %server,
                    region = %request.region,
                    duration_ms = result.duration_ms,
                    "Compaction finished"
                );
                DispatchOutcome::Succeeded {
                    server: server.clone(),
                    region: request.region.clone(),
                    duration_ms: result.duration_ms,
                }
            }
            Ok(Ok(result)) => {
                warn!(
                    server = %server,
                    region = %request.region,
                    status = ?result.status,
                    exit_code = ?result.exit_code,
                    "Compaction did not succeed"
                );
                failed(format!(
                    "compaction ended with status {:?} (exit code {:?})",
                    result.status, result.exit_code
                ))
            }
            Ok(Err(e)) => {
                warn!(server = %server, region = %request.region, error = %e, "Compaction failed");
                failed(e.to_string())
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    error!(server = %server, region = %request.region, "Compaction executor panicked");
                } else {
                    error!(server = %server, region = %request.region, "Compaction executor cancelled");
                }
                failed(format!("executor task aborted: {join_err}"))
            }
        }
    }
}
