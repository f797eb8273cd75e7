//! Layered settings: defaults, optional config file, COMPACTOR_* environment
//! variables, then command-line flags.

use crate::cli::Cli;
use anyhow::{Context, Result};
use compaction_core::application::compactor::constants::DEFAULT_ENV_ALLOWLIST;
use compaction_core::domain::AdmissionMode;
use compaction_core::CompactorConfig;
use compaction_infra_system::CommandTemplate;
use config::{Config, Environment, File};
use serde::Deserialize;

const ENV_PREFIX: &str = "COMPACTOR";

/// Settings only the binary cares about
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct DaemonSettings {
    command: Option<CommandTemplate>,
    env_allowlist: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub compactor: CompactorConfig,
    pub command: Option<CommandTemplate>,
    pub env_allowlist: Vec<String>,
}

impl Settings {
    /// Load file and environment layers, then apply CLI overrides
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let raw = load_layers(cli.config.as_deref())?;
        let settings = Self::from_layers(raw)?.with_overrides(cli);
        settings.compactor.validate()?;
        Ok(settings)
    }

    fn from_layers(raw: Config) -> Result<Self> {
        let compactor: CompactorConfig = raw
            .clone()
            .try_deserialize()
            .context("Invalid compactor settings")?;
        let daemon: DaemonSettings = raw
            .try_deserialize()
            .context("Invalid command settings")?;

        Ok(Self {
            compactor,
            command: daemon.command,
            env_allowlist: daemon.env_allowlist.unwrap_or_else(|| {
                DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect()
            }),
        })
    }

    fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(max) = cli.max_concurrent {
            self.compactor.max_concurrent_servers = max;
        }
        if let Some(poll) = cli.poll_interval_ms {
            self.compactor.poll_interval_ms = poll;
        }
        if cli.strict {
            self.compactor.admission = AdmissionMode::Strict;
        }
        if cli.dry_run {
            self.compactor.dry_run = true;
        }

        if let Some(program) = &cli.command {
            let mut template = CommandTemplate::new(program.clone());
            template.args = cli.args.clone();
            self.command = Some(template);
        }
        if let (Some(template), Some(timeout_ms)) = (self.command.as_mut(), cli.timeout_ms) {
            template.timeout_ms = Some(timeout_ms);
        }
        self
    }
}

fn load_layers(config_path: Option<&str>) -> Result<Config> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        let path = shellexpand::tilde(path).into_owned();
        builder = builder.add_source(File::with_name(&path).required(true));
    }

    builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("env_allowlist"),
        )
        .build()
        .context("Failed to load configuration")
}
