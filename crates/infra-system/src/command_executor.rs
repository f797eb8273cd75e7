// Command executor implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use compaction_core::domain::CompactionRequest;
use compaction_core::port::compaction_executor::{
    CompactionExecutor, ExecutionError, ExecutionResult, ExecutionStatus,
};
use compaction_core::port::TimeProvider;

/// Command line run once per compaction request.
///
/// Each argument may contain placeholders that are filled from the request:
/// `{server}`, `{host}`, `{port}`, `{start_code}`, `{region}` and `{stores}`
/// (comma-joined column families, empty for the whole region).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Kill the command if it runs longer than this
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout_ms: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Fill the placeholders of every argument from `request`.
    /// Substituted values are never scanned again for placeholders.
    pub fn render_args(&self, request: &CompactionRequest) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| render_placeholders(arg, |key| placeholder_value(request, key)))
            .collect()
    }
}

fn placeholder_value(request: &CompactionRequest, key: &str) -> Option<String> {
    let server = &request.server;
    match key {
        "server" => Some(server.to_string()),
        "host" => Some(server.host().to_string()),
        "port" => Some(server.port().to_string()),
        "start_code" => Some(server.start_code().to_string()),
        "region" => Some(request.region.clone()),
        "stores" => Some(request.stores_csv()),
        _ => None,
    }
}

/// Single left-to-right pass; unknown `{...}` sequences are kept verbatim
fn render_placeholders(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let tail = &rest[open..];
        let substitution = tail
            .find('}')
            .and_then(|close| lookup(&tail[1..close]).map(|value| (close, value)));

        match substitution {
            Some((close, value)) => {
                rendered.push_str(&value);
                rest = &tail[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Runs a compaction by spawning the configured command.
/// The child only sees allowlisted environment variables.
pub struct CommandExecutor {
    template: CommandTemplate,
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Vec<String>,
}

impl CommandExecutor {
    /// Create a new command executor
    ///
    /// # Arguments
    /// * `template` - Command line with request placeholders
    /// * `time_provider` - Time provider for duration tracking
    /// * `env_allowlist` - Environment variables passed through to the child
    ///
    /// # Example
    /// ```ignore
    /// let executor = CommandExecutor::new(
    ///     CommandTemplate::new("compact-region").arg("{server}").arg("{region}"),
    ///     Arc::new(SystemTimeProvider),
    ///     vec!["PATH".to_string(), "HBASE_CONF_DIR".to_string()],
    /// );
    /// ```
    pub fn new(
        template: CommandTemplate,
        time_provider: Arc<dyn TimeProvider>,
        env_allowlist: Vec<String>,
    ) -> Self {
        Self {
            template,
            time_provider,
            env_allowlist,
        }
    }

    /// Keep only allowlisted variables
    fn filter_env(&self, env: impl IntoIterator<Item = (String, String)>) -> HashMap<String, String> {
        env.into_iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .collect()
    }

    /// Spawn the child process and wait for its output
    async fn spawn_and_wait(&self, args: &[String]) -> Result<std::process::Output, ExecutionError> {
        let filtered_env = self.filter_env(std::env::vars());

        let mut command = Command::new(&self.template.program);
        command
            .args(args)
            .env_clear()
            .envs(&filtered_env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.template.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", self.template.program, e)))?;

        match self.template.timeout_ms {
            // Dropping the wait future on timeout kills the child
            Some(timeout_ms) => match timeout(
                Duration::from_millis(timeout_ms),
                child.wait_with_output(),
            )
            .await
            {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(ExecutionError::IoError(e.to_string())),
                Err(_) => Err(ExecutionError::Timeout(timeout_ms as i64)),
            },
            None => child
                .wait_with_output()
                .await
                .map_err(|e| ExecutionError::IoError(e.to_string())),
        }
    }

    /// Build execution result from process output
    fn build_result(output: std::process::Output, duration_ms: i64) -> ExecutionResult {
        let status = if output.status.success() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };

        ExecutionResult {
            status,
            exit_code: output.status.code(),
            duration_ms,
            stdout: Some(String::from_utf8_lossy(&output.stdout).to_string()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        }
    }
}

#[async_trait]
impl CompactionExecutor for CommandExecutor {
    async fn compact(
        &self,
        request: &CompactionRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        if self.template.program.trim().is_empty() {
            return Err(ExecutionError::InvalidRequest(
                "compaction command is empty".to_string(),
            ));
        }

        let args = self.template.render_args(request);
        let start_time = self.time_provider.now_millis();

        info!(
            program = %self.template.program,
            args = ?args,
            timeout_ms = ?self.template.timeout_ms,
            "Spawning compaction command"
        );

        let output = self.spawn_and_wait(&args).await?;
        let duration_ms = self.time_provider.now_millis() - start_time;
        let result = Self::build_result(output, duration_ms);

        if result.status == ExecutionStatus::Success {
            info!(
                region = %request.region,
                duration_ms = %duration_ms,
                "Compaction command completed"
            );
        } else {
            warn!(
                region = %request.region,
                exit_code = ?result.exit_code,
                stderr = %result.stderr.as_deref().unwrap_or_default().trim(),
                "Compaction command exited with failure"
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compaction_core::domain::ServerName;
    use compaction_core::port::time_provider::SystemTimeProvider;

    fn request() -> CompactionRequest {
        CompactionRequest::new(ServerName::new("rs1.example.com", 16020, 99), "t1,,1.abc.")
            .with_stores(["cf1", "cf2"])
    }

    fn executor(template: CommandTemplate) -> CommandExecutor {
        CommandExecutor::new(
            template,
            Arc::new(SystemTimeProvider),
            vec!["PATH".to_string(), "HOME".to_string()],
        )
    }

    #[test]
    fn test_render_args() {
        let template = CommandTemplate::new("compact")
            .arg("--server={server}")
            .arg("{host}:{port}@{start_code}")
            .arg("{region}")
            .arg("{stores}");

        assert_eq!(
            template.render_args(&request()),
            vec![
                "--server=rs1.example.com,16020,99",
                "rs1.example.com:16020@99",
                "t1,,1.abc.",
                "cf1,cf2",
            ]
        );
    }

    #[test]
    fn test_render_args_does_not_expand_substituted_values() {
        let request = CompactionRequest::new(ServerName::new("rs1", 16020, 1), "t1,{stores},{x}")
            .with_stores(["cf1"]);
        let template = CommandTemplate::new("compact")
            .arg("{region}")
            .arg("{unknown}-{{stores}}")
            .arg("{host");

        assert_eq!(
            template.render_args(&request),
            vec!["t1,{stores},{x}", "{unknown}-{cf1}", "{host"]
        );
    }

    #[tokio::test]
    async fn test_execute_success() {
        let executor = executor(CommandTemplate::new("echo").arg("compacting").arg("{region}"));

        let result = executor.compact(&request()).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.stdout.unwrap_or_default().contains("compacting t1,,1.abc."));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failed() {
        let executor = executor(CommandTemplate::new("sh").arg("-c").arg("exit 3"));

        let result = executor.compact(&request()).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let executor = executor(CommandTemplate::new("sleep").arg("10").with_timeout_ms(100));

        let result = executor.compact(&request()).await;

        assert!(matches!(result, Err(ExecutionError::Timeout(100))));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let executor = executor(CommandTemplate::new("/nonexistent/compact-region"));

        let result = executor.compact(&request()).await;

        assert!(matches!(result, Err(ExecutionError::SpawnFailed(_))));
    }

    #[test]
    fn test_empty_program_rejected() {
        let executor = executor(CommandTemplate::new("  "));

        let result = tokio_test::block_on(executor.compact(&request()));

        assert!(matches!(result, Err(ExecutionError::InvalidRequest(_))));
    }

    #[test]
    fn test_env_filtering() {
        let executor = CommandExecutor::new(
            CommandTemplate::new("true"),
            Arc::new(SystemTimeProvider),
            vec!["ALLOWED_VAR".to_string()],
        );

        let filtered = executor.filter_env([
            ("ALLOWED_VAR".to_string(), "value1".to_string()),
            ("BLOCKED_VAR".to_string(), "value2".to_string()),
        ]);

        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("ALLOWED_VAR"));
        assert!(!filtered.contains_key("BLOCKED_VAR"));
    }
}
