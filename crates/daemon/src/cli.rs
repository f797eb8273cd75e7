//! Command-line arguments

use crate::logging::LogFormat;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cluster-compactor")]
#[command(about = "Run major compactions across region servers, a bounded number at a time", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Compaction plan: JSON array of {"server", "region", "stores"} entries
    #[arg(short, long, env = "COMPACTOR_PLAN")]
    pub plan: String,

    /// Config file (TOML, YAML or JSON); COMPACTOR_* variables override it
    #[arg(short, long, env = "COMPACTOR_CONFIG")]
    pub config: Option<String>,

    /// Maximum number of servers compacting at once
    #[arg(short = 'n', long)]
    pub max_concurrent: Option<usize>,

    /// Wait between polls when every candidate server is busy
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Make reservations themselves enforce the concurrency cap
    #[arg(long)]
    pub strict: bool,

    /// Log what would be compacted without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Program run once per request
    #[arg(long)]
    pub command: Option<String>,

    /// Argument for --command (repeatable). Placeholders: {server} {host}
    /// {port} {start_code} {region} {stores}
    #[arg(long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Kill a compaction command running longer than this
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[arg(long, env = "COMPACTOR_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Also write JSON logs to a daily rolling file in this directory
    #[arg(long)]
    pub log_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_placeholders() {
        let cli = Cli::try_parse_from([
            "cluster-compactor",
            "--plan",
            "plan.json",
            "-n",
            "4",
            "--command",
            "hbase-compact",
            "--arg",
            "--server={server}",
            "--arg",
            "{region}",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.plan, "plan.json");
        assert_eq!(cli.max_concurrent, Some(4));
        assert_eq!(cli.command.as_deref(), Some("hbase-compact"));
        assert_eq!(cli.args, vec!["--server={server}", "{region}"]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
