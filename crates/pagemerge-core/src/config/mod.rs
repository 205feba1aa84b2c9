//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod logging;
pub mod merge;
pub mod notify;
pub mod paths;
pub mod runner;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::merge::MergeConfig;
pub use self::notify::NotifyConfig;
pub use self::paths::PathsConfig;
pub use self::runner::{JobsConfig, MAX_THRESHOLD_MINUTES, RunnerConfig, StagnationConfig};

use crate::error::AppError;

/// Prefix for environment variable overrides (`PAGEMERGE__DATABASE__URL`).
pub const ENV_PREFIX: &str = "PAGEMERGE";

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// (`default.toml` + environment overlay + environment variables).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Watched directory roots and the control file.
    pub paths: PathsConfig,
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Job directory naming.
    #[serde(default)]
    pub jobs: JobsConfig,
    /// External merge operation settings.
    pub merge: MergeConfig,
    /// Stagnation detection settings.
    #[serde(default)]
    pub stagnation: StagnationConfig,
    /// Failure notification settings.
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Run loop settings.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `<dir>/default.toml` with `<dir>/<env>.toml` and environment
    /// variables prefixed with `PAGEMERGE__`, then validates the result.
    pub fn load(dir: &str, env: &str) -> Result<Self, AppError> {
        let dir = dir.trim_end_matches('/');
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the run loop cannot work with.
    pub fn validate(&self) -> Result<(), AppError> {
        self.paths.validate()?;
        self.database.validate()?;
        self.merge.validate()?;
        self.notify.validate()?;

        if self.jobs.name_prefix.is_empty() {
            return Err(AppError::configuration("jobs.name_prefix must not be empty"));
        }
        if self.stagnation.threshold_minutes == 0 {
            return Err(AppError::configuration(
                "stagnation.threshold_minutes must be greater than zero",
            ));
        }
        if self.stagnation.threshold_minutes > MAX_THRESHOLD_MINUTES {
            return Err(AppError::configuration(format!(
                "stagnation.threshold_minutes must be at most {MAX_THRESHOLD_MINUTES}"
            )));
        }
        Ok(())
    }

    /// Stagnation threshold as a chrono duration.
    pub fn stagnation_threshold(&self) -> chrono::Duration {
        let minutes = self.stagnation.threshold_minutes.min(MAX_THRESHOLD_MINUTES);
        chrono::Duration::minutes(minutes as i64)
    }

    /// Delay between passes when the loop repeats.
    pub fn pass_delay(&self) -> Duration {
        Duration::from_millis(self.runner.pass_delay_ms)
    }
}
