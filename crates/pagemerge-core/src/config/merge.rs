//! External merge operation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// How the external merge command is invoked and how long it may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Executable that merges the input PDFs.
    pub command: String,
    /// Argument template; `{inputs}` is the delimited input list,
    /// `{output}` the destination path.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Separator between input paths in `{inputs}`.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Upper bound for a single merge command, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Upper bound for the merged file to appear after a successful merge.
    #[serde(default = "default_artifact_timeout")]
    pub artifact_timeout_seconds: u64,
    /// Poll interval while waiting for the merged file.
    #[serde(default = "default_poll_interval")]
    pub artifact_poll_interval_ms: u64,
}

impl MergeConfig {
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if self.command.trim().is_empty() {
            return Err(AppError::configuration("merge.command must not be empty"));
        }
        if self.delimiter.is_empty() {
            return Err(AppError::configuration("merge.delimiter must not be empty"));
        }
        if self.delimiter.contains('/') || self.delimiter.contains('\\') {
            return Err(AppError::configuration(
                "merge.delimiter must not contain a path separator",
            ));
        }
        if self.artifact_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "merge.artifact_timeout_seconds must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Bound for one invocation of the merge command.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Bound for the merged artifact to materialize.
    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_secs(self.artifact_timeout_seconds)
    }

    /// Interval between artifact existence checks.
    pub fn artifact_poll_interval(&self) -> Duration {
        Duration::from_millis(self.artifact_poll_interval_ms.max(1))
    }
}

fn default_args() -> Vec<String> {
    vec!["{inputs}".to_string(), "{output}".to_string()]
}

fn default_delimiter() -> String {
    "+".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_artifact_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    1000
}
