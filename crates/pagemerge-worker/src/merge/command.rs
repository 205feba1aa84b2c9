//! Merge backend that runs an external command.
//!
//! The command line is built from an argument template in which `{inputs}`
//! expands to the delimiter-joined input list and `{output}` to the
//! destination path.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing;

use pagemerge_core::config::MergeConfig;
use pagemerge_core::traits::{MergeBackend, MergeFailure};

/// Longest stderr excerpt kept in a failure.
const MAX_DETAIL_CHARS: usize = 2000;

/// Runs a configured executable per merge, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct CommandMergeBackend {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandMergeBackend {
    /// Create a backend for `command` with an argument template.
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    /// Build a backend from the `[merge]` configuration section.
    pub fn from_config(config: &MergeConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone(), config.timeout())
    }

    /// Substitute the template placeholders.
    pub fn substitute_args(&self, inputs: &str, destination: &Path) -> Vec<String> {
        let output = destination.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{inputs}", inputs).replace("{output}", &output))
            .collect()
    }
}

#[async_trait]
impl MergeBackend for CommandMergeBackend {
    fn name(&self) -> &str {
        &self.command
    }

    async fn merge(&self, inputs: &str, destination: &Path) -> Result<(), MergeFailure> {
        let start = Instant::now();
        let args = self.substitute_args(inputs, destination);

        tracing::debug!(
            command = %self.command,
            output = %destination.display(),
            "Running merge command"
        );

        let mut cmd = Command::new(&self.command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(MergeFailure::Unavailable {
                    reason: format!("failed to start '{}': {e}", self.command),
                });
            }
            Err(_) => {
                tracing::error!(
                    command = %self.command,
                    timeout_secs = self.timeout.as_secs(),
                    "Merge command timed out"
                );
                return Err(MergeFailure::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail: String = stderr.trim().chars().take(MAX_DETAIL_CHARS).collect();
            let code = output.status.code().unwrap_or(-1);
            tracing::error!(command = %self.command, code, duration_ms, "Merge command failed");
            return Err(MergeFailure::Rejected { code, detail });
        }

        tracing::debug!(command = %self.command, duration_ms, "Merge command finished");
        Ok(())
    }
}
