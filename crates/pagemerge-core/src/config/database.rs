//! Database configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Schema-qualified table holding one record per job.
    #[serde(default = "default_table")]
    pub table: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if self.url.is_empty() {
            return Err(AppError::configuration("database.url must not be empty"));
        }
        if !is_valid_table_name(&self.table) {
            return Err(AppError::configuration(format!(
                "database.table '{}' is not a plain or schema-qualified identifier",
                self.table
            )));
        }
        Ok(())
    }
}

/// The table name is interpolated into SQL text, so only `ident` or
/// `schema.ident` made of ASCII letters, digits and underscores is accepted.
pub fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

fn default_table() -> String {
    "public.items".to_string()
}

fn default_max_connections() -> u32 {
    4
}

fn default_min_connections() -> u32 {
    0
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}
