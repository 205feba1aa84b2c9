//! Delivery of merged artifacts from the temp merge area to the output area.

use std::path::{Path, PathBuf};

use tracing;

use pagemerge_core::error::{AppError, ErrorKind};
use pagemerge_core::result::AppResult;

/// Moves every file in `temp_dir` into `output_dir`.
#[derive(Debug, Clone)]
pub struct ArtifactMover {
    temp_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactMover {
    /// Create a mover between the two areas.
    pub fn new(temp_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Move all artifacts, replacing same-named files in the output area.
    ///
    /// A file that cannot be moved is logged and left in place for the next
    /// pass. Returns the number of files delivered.
    pub async fn deliver_all(&self) -> AppResult<usize> {
        let files = crate::fs::list_files(&self.temp_dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to list {}", self.temp_dir.display()),
                e,
            )
        })?;

        let mut delivered = 0;
        for file in files {
            match self.deliver(&file).await {
                Ok(destination) => {
                    tracing::info!(destination = %destination.display(), "Delivered merged file");
                    delivered += 1;
                }
                Err(e) => {
                    tracing::error!(file = %file.display(), error = %e, "Error moving merged file into output");
                }
            }
        }
        Ok(delivered)
    }

    async fn deliver(&self, file: &Path) -> std::io::Result<PathBuf> {
        let name = file
            .file_name()
            .ok_or_else(|| std::io::Error::other("artifact has no file name"))?;
        let destination = self.output_dir.join(name);

        if tokio::fs::try_exists(&destination).await? {
            tokio::fs::remove_file(&destination).await?;
        }
        crate::fs::move_file(file, &destination).await?;
        Ok(destination)
    }
}
