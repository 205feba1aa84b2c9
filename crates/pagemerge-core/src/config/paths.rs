//! Watched directory roots.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Filesystem locations the run loop works against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root where job directories wait to be merged.
    pub pending: PathBuf,
    /// Root where failed job directories are relocated for inspection.
    pub error: PathBuf,
    /// Final output area for merged PDFs.
    pub output: PathBuf,
    /// Scratch area the merge operation writes into.
    pub temp_merge: PathBuf,
    /// Text file whose content (`true`) keeps the run loop going.
    pub control_file: PathBuf,
}

impl PathsConfig {
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        let named = [
            ("paths.pending", &self.pending),
            ("paths.error", &self.error),
            ("paths.output", &self.output),
            ("paths.temp_merge", &self.temp_merge),
            ("paths.control_file", &self.control_file),
        ];
        for (name, path) in named {
            if path.as_os_str().is_empty() {
                return Err(AppError::configuration(format!("{name} must not be empty")));
            }
        }
        if self.pending == self.error {
            return Err(AppError::configuration(
                "paths.pending and paths.error must be different directories",
            ));
        }
        Ok(())
    }
}
