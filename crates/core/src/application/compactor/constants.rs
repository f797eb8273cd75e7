// Compactor constants (no magic values)

/// Default wait between polls when no server can be reserved (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default number of servers compacting at once
pub const DEFAULT_MAX_CONCURRENT_SERVERS: usize = 1;

/// Environment variables passed through to compaction commands by default
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER", "JAVA_HOME", "HBASE_CONF_DIR"];
