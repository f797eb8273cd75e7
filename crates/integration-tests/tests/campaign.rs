// End-to-end campaign tests: queue table + compactor + executors

use compaction_core::application::compactor::{queues_from_config, shutdown_channel, Compactor};
use compaction_core::application::ShutdownToken;
use compaction_core::domain::{ClusterCompactionQueues, CompactionRequest, ServerName};
use compaction_core::port::compaction_executor::mocks::MockCompactionExecutor;
use compaction_core::port::id_provider::UuidProvider;
use compaction_core::port::time_provider::SystemTimeProvider;
use compaction_core::port::CompactionExecutor;
use compaction_core::CompactorConfig;
use compaction_infra_system::{CommandExecutor, CommandTemplate};
use std::sync::Arc;
use std::time::Duration;

fn server(i: usize) -> ServerName {
    ServerName::new(format!("rs-{i}"), 16020, 1)
}

fn config(max: usize) -> CompactorConfig {
    CompactorConfig {
        max_concurrent_servers: max,
        poll_interval_ms: 2,
        ..Default::default()
    }
}

fn load(config: &CompactorConfig, servers: usize, per_server: usize) -> Arc<ClusterCompactionQueues> {
    let queues = Arc::new(queues_from_config(config).unwrap());
    for i in 0..servers {
        for r in 0..per_server {
            queues.enqueue(server(i), CompactionRequest::new(server(i), format!("region-{r}")));
        }
    }
    queues
}

fn compactor(
    config: CompactorConfig,
    queues: Arc<ClusterCompactionQueues>,
    executor: Arc<dyn CompactionExecutor>,
) -> Compactor {
    Compactor::new(
        queues,
        executor,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        config,
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_campaign_respects_global_and_per_server_limits() {
    let config = config(3);
    let queues = load(&config, 6, 4);
    let executor = Arc::new(MockCompactionExecutor::new_delayed(Duration::from_millis(3)));
    let compactor = compactor(config, queues.clone(), executor.clone());

    let summary = compactor.run(ShutdownToken::never()).await;

    assert!(summary.is_success());
    assert_eq!(summary.succeeded, 24);
    assert_eq!(executor.call_count(), 24);
    assert!(executor.max_in_flight() <= 3);
    assert_eq!(executor.max_in_flight_per_server(), 1);
    assert_eq!(queues.busy_count(), 0);

    // every request ran exactly once
    let mut ran: Vec<String> = executor
        .executed()
        .iter()
        .map(|r| format!("{}/{}", r.server, r.region))
        .collect();
    ran.sort();
    ran.dedup();
    assert_eq!(ran.len(), 24);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_mid_campaign_reports_remaining() {
    let config = config(1);
    let queues = load(&config, 1, 50);
    let executor = Arc::new(MockCompactionExecutor::new_delayed(Duration::from_millis(20)));
    let compactor = compactor(config, queues.clone(), executor.clone());

    let (tx, token) = shutdown_channel();
    let run = tokio::spawn(async move { compactor.run(token).await });

    tokio::time::sleep(Duration::from_millis(70)).await;
    tx.shutdown();

    let summary = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("campaign should stop promptly")
        .unwrap();

    assert!(summary.succeeded >= 1);
    assert!(summary.remaining > 0);
    assert_eq!(summary.succeeded + summary.remaining, 50);
    assert!(!summary.is_success());
    assert_eq!(queues.busy_count(), 0);
}

#[tokio::test]
async fn test_command_executor_campaign() {
    let config = config(2);
    let queues = load(&config, 2, 2);
    let executor: Arc<dyn CompactionExecutor> = Arc::new(CommandExecutor::new(
        CommandTemplate::new("sh")
            .arg("-c")
            .arg("test \"$1\" != region-1")
            .arg("compact")
            .arg("{region}"),
        Arc::new(SystemTimeProvider),
        vec!["PATH".to_string()],
    ));
    let compactor = compactor(config, queues, executor);

    let summary = compactor.run(ShutdownToken::never()).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed.len(), 2);
    assert!(summary.failed.iter().all(|f| f.region == "region-1"));
    assert!(summary.failed[0].reason.contains("exit code Some(1)"));
}

#[tokio::test]
async fn test_summary_serializes_for_reporting() {
    let config = config(1);
    let queues = load(&config, 1, 1);
    let executor = Arc::new(MockCompactionExecutor::new_fail("region offline"));
    let compactor = compactor(config, queues, executor);

    let summary = compactor.run(ShutdownToken::never()).await;
    let json = serde_json_value(&summary);

    assert_eq!(json["succeeded"], 0);
    assert_eq!(json["failed"][0]["server"], "rs-0,16020,1");
    assert_eq!(json["failed"][0]["reason"], "Spawn failed: region offline");
}

fn serde_json_value<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}
