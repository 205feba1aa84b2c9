//! Merge executor: merges one job and cleans up its source directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing;

use pagemerge_core::config::MergeConfig;
use pagemerge_core::traits::{JobStateStore, MergeBackend, MergeFailure};
use pagemerge_core::types::{Job, MergedArtifact};

/// Merges a job's files into `<temp_merge>/<id>.pdf`.
#[derive(Debug)]
pub struct MergeExecutor {
    store: Arc<dyn JobStateStore>,
    backend: Arc<dyn MergeBackend>,
    temp_dir: PathBuf,
    delimiter: String,
    artifact_timeout: Duration,
    poll_interval: Duration,
}

impl MergeExecutor {
    /// Create a new merge executor.
    pub fn new(
        store: Arc<dyn JobStateStore>,
        backend: Arc<dyn MergeBackend>,
        temp_dir: PathBuf,
        config: &MergeConfig,
    ) -> Self {
        Self {
            store,
            backend,
            temp_dir,
            delimiter: config.delimiter.clone(),
            artifact_timeout: config.artifact_timeout(),
            poll_interval: config.artifact_poll_interval(),
        }
    }

    /// Where the merged file for `job` is written.
    pub fn artifact_path(&self, job: &Job) -> PathBuf {
        self.temp_dir.join(job.id.artifact_file_name())
    }

    /// Merge one job.
    ///
    /// On success the record is cleared, the artifact is confirmed on disk
    /// and the source directory is removed. On failure the source directory
    /// is left where it is.
    pub async fn merge_one(&self, job: &Job) -> Result<MergedArtifact, MergeFailure> {
        let inputs = crate::fs::list_files(&job.path)
            .await
            .map_err(|e| MergeFailure::Listing {
                path: job.path.clone(),
                reason: e.to_string(),
            })?;

        if inputs.is_empty() {
            return Err(MergeFailure::NoInputs {
                path: job.path.clone(),
            });
        }

        let joined = join_inputs(&inputs, &self.delimiter)?;
        let destination = self.artifact_path(job);

        tracing::info!(
            job_id = %job.id,
            files = inputs.len(),
            backend = self.backend.name(),
            destination = %destination.display(),
            "Merging job"
        );

        if let Err(failure) = self.backend.merge(&joined, &destination).await {
            discard_partial(&destination).await;
            return Err(failure);
        }

        if let Err(e) = self.store.mark_succeeded(job.id).await {
            tracing::error!(job_id = %job.id, error = %e, "Could not clear job error state");
        }

        if let Err(failure) = self.wait_for_artifact(&destination).await {
            discard_partial(&destination).await;
            return Err(failure);
        }

        tokio::fs::remove_dir_all(&job.path)
            .await
            .map_err(|e| MergeFailure::SourceCleanup {
                path: job.path.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(job_id = %job.id, "Job merged and source removed");

        Ok(MergedArtifact {
            job_id: job.id,
            path: destination,
        })
    }

    /// Poll for the artifact until a monotonic deadline.
    async fn wait_for_artifact(&self, path: &Path) -> Result<(), MergeFailure> {
        let deadline = Instant::now() + self.artifact_timeout;
        loop {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                tracing::error!(path = %path.display(), "Merged file never appeared");
                return Err(MergeFailure::ArtifactTimeout {
                    path: path.to_path_buf(),
                    seconds: self.artifact_timeout.as_secs(),
                });
            }
            tokio::time::sleep_until((Instant::now() + self.poll_interval).min(deadline)).await;
        }
    }
}

/// Remove whatever a failed merge left at `path` so it is never delivered.
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::info!(path = %path.display(), "Removed partial merge output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not remove partial merge output");
        }
    }
}

/// Join absolute input paths with `delimiter`, refusing paths that contain it.
pub fn join_inputs(inputs: &[PathBuf], delimiter: &str) -> Result<String, MergeFailure> {
    let mut parts = Vec::with_capacity(inputs.len());
    for path in inputs {
        let text = path.to_string_lossy();
        if text.contains(delimiter) {
            return Err(MergeFailure::DelimiterCollision {
                path: path.clone(),
                delimiter: delimiter.to_string(),
            });
        }
        parts.push(text.into_owned());
    }
    Ok(parts.join(delimiter))
}
