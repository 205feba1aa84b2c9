//! Failure notification configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Outbound mail settings for the per-pass failure report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Whether reports are mailed. When disabled they are only logged.
    #[serde(default)]
    pub enabled: bool,
    /// SMTP relay host.
    #[serde(default)]
    pub smtp_host: String,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Sender address.
    #[serde(default)]
    pub from: String,
    /// Recipient address.
    #[serde(default)]
    pub to: String,
    /// Subject prefix; the local timestamp is appended.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            from: String::new(),
            to: String::new(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

impl NotifyConfig {
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if !self.enabled {
            return Ok(());
        }
        if self.smtp_host.is_empty() || self.from.is_empty() || self.to.is_empty() {
            return Err(AppError::configuration(
                "notify.smtp_host, notify.from and notify.to are required when notify.enabled",
            ));
        }
        Ok(())
    }
}

fn default_smtp_port() -> u16 {
    25
}

fn default_subject_prefix() -> String {
    "PDF Merger Error".to_string()
}
