//! Cluster Compactor - Main Entry Point
//! Loads a compaction plan and runs it with bounded per-server concurrency

mod cli;
mod logging;
mod plan;
mod settings;

use anyhow::{bail, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

// Import workspace crates
use compaction_core::application::compactor::{queues_from_config, shutdown_channel, Compactor};
use compaction_core::port::id_provider::UuidProvider;
use compaction_core::port::time_provider::SystemTimeProvider;
use compaction_core::port::{CompactionExecutor, IdProvider, TimeProvider};
use compaction_infra_system::CommandExecutor;

use cli::Cli;
use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Initialize logging
    let _log_guard = logging::init_logging(cli.log_format, cli.log_dir.as_deref())?;
    info!("Cluster Compactor v{} starting...", VERSION);

    // 2. Load configuration
    let settings = Settings::resolve(&cli)?;
    info!(
        max_concurrent = settings.compactor.max_concurrent_servers,
        admission = ?settings.compactor.admission,
        dry_run = settings.compactor.dry_run,
        "Configuration loaded"
    );

    // 3. Build the queue table from the plan
    let queues = Arc::new(queues_from_config(&settings.compactor)?);
    let enqueued = plan::enqueue_plan(&queues, plan::load_plan(&cli.plan)?);
    info!(
        requests = enqueued,
        servers = queues.server_count(),
        "Compaction plan loaded"
    );
    if enqueued == 0 {
        info!("Nothing to compact");
        return Ok(ExitCode::SUCCESS);
    }

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);

    let compactor = match (&settings.command, settings.compactor.dry_run) {
        (_, true) => Compactor::dry_run(
            queues,
            time_provider,
            id_provider,
            settings.compactor.clone(),
        )?,
        (Some(template), false) => {
            let executor: Arc<dyn CompactionExecutor> = Arc::new(CommandExecutor::new(
                template.clone(),
                time_provider.clone(),
                settings.env_allowlist.clone(),
            ));
            Compactor::new(
                queues,
                executor,
                time_provider,
                id_provider,
                settings.compactor.clone(),
            )?
        }
        (None, false) => bail!(
            "No compaction command configured: pass --command, set `command` in the config file, or use --dry-run"
        ),
    };

    // 5. Stop dispatching on Ctrl+C; in-flight compactions finish
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received. Finishing in-flight compactions...");
            shutdown_tx.shutdown();
        }
    });

    // 6. Run the campaign
    let summary = compactor.run(shutdown_rx).await;

    for failure in &summary.failed {
        error!(
            server = %failure.server,
            region = %failure.region,
            reason = %failure.reason,
            "Compaction failed"
        );
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.is_success() {
        info!("All compactions finished.");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
