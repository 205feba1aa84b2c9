//! Run loop, job naming and stagnation settings.

use serde::{Deserialize, Serialize};

/// Run loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Fixed delay between passes when the loop repeats, in milliseconds.
    #[serde(default = "default_pass_delay")]
    pub pass_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pass_delay_ms: default_pass_delay(),
        }
    }
}

/// Job directory naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Literal token preceding the numeric id in a job directory name.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
        }
    }
}

/// Largest accepted stagnation threshold, about two years.
pub const MAX_THRESHOLD_MINUTES: u64 = 1_000_000;

/// Stagnation detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagnationConfig {
    /// Age after which a pending job is considered stuck.
    #[serde(default = "default_threshold")]
    pub threshold_minutes: u64,
}

impl Default for StagnationConfig {
    fn default() -> Self {
        Self {
            threshold_minutes: default_threshold(),
        }
    }
}

fn default_pass_delay() -> u64 {
    1000
}

fn default_name_prefix() -> String {
    "item".to_string()
}

fn default_threshold() -> u64 {
    30
}
