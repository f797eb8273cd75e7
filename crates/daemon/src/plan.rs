//! Compaction plan loading.
//!
//! A plan is produced elsewhere (for example by scanning the cluster for
//! regions due a major compaction) and handed over as a JSON array.

use anyhow::{Context, Result};
use compaction_core::domain::{ClusterCompactionQueues, CompactionRequest};

pub fn parse_plan(json: &str) -> Result<Vec<CompactionRequest>> {
    serde_json::from_str(json).context("Invalid compaction plan")
}

pub fn load_plan(path: &str) -> Result<Vec<CompactionRequest>> {
    let path = shellexpand::tilde(path).into_owned();
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read compaction plan {path}"))?;
    parse_plan(&json)
}

/// Enqueue every request on its server's queue, keeping plan order
pub fn enqueue_plan(queues: &ClusterCompactionQueues, plan: Vec<CompactionRequest>) -> usize {
    let count = plan.len();
    for request in plan {
        queues.enqueue(request.server.clone(), request);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use compaction_core::domain::{QueueTable, ServerName};

    const PLAN: &str = r#"[
        { "server": "rs1,16020,1", "region": "r1", "stores": ["cf"] },
        { "server": "rs2,16020,1", "region": "r2" },
        { "server": "rs1,16020,1", "region": "r3" }
    ]"#;

    #[test]
    fn test_enqueue_keeps_plan_order_per_server() {
        let queues: ClusterCompactionQueues = QueueTable::new(1).unwrap();
        let count = enqueue_plan(&queues, parse_plan(PLAN).unwrap());

        assert_eq!(count, 3);
        assert_eq!(queues.server_count(), 2);

        let rs1 = queues.queue_for(&ServerName::new("rs1", 16020, 1)).unwrap();
        let regions: Vec<&str> = rs1.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["r1", "r3"]);
    }

    #[test]
    fn test_bad_server_name_rejected() {
        let err = parse_plan(r#"[{ "server": "rs1:16020", "region": "r1" }]"#).unwrap_err();
        assert!(err.to_string().contains("Invalid compaction plan"));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_plan("/nonexistent/plan.json").is_err());
    }
}
