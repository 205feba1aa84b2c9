//! Reconciliation between the pending area and the error area.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing;

use pagemerge_core::error::{AppError, ErrorKind};
use pagemerge_core::result::AppResult;
use pagemerge_core::traits::JobStateStore;
use pagemerge_core::types::Job;

use crate::report::{FailureCause, FailureReport};

/// Moves failed jobs into the error area and keeps their records in step.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn JobStateStore>,
    error_root: PathBuf,
}

impl ReconciliationEngine {
    /// Create an engine relocating into `error_root`.
    pub fn new(store: Arc<dyn JobStateStore>, error_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            error_root: error_root.into(),
        }
    }

    /// Where `job` lands in the error area.
    pub fn error_path(&self, job: &Job) -> PathBuf {
        job.path_under(&self.error_root)
    }

    /// Move the job directory into the error area.
    ///
    /// If the destination already exists and the source is still present,
    /// the destination is removed and the move is retried once. Any other
    /// failure, or a second failure, is returned.
    pub async fn relocate_to_error_area(&self, job: &Job) -> AppResult<PathBuf> {
        let destination = self.error_path(job);
        tokio::fs::create_dir_all(&self.error_root).await?;

        let first = match crate::fs::move_dir(&job.path, &destination).await {
            Ok(()) => return Ok(destination),
            Err(e) => e,
        };

        // Only a destination in the way is cleared; a vanished source leaves
        // the error-area copy untouched.
        let source_present = tokio::fs::try_exists(&job.path).await.unwrap_or(false);
        let destination_present = tokio::fs::try_exists(&destination).await.unwrap_or(false);
        if !source_present || !destination_present {
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!(
                    "Failed to move {} to {}",
                    job.path.display(),
                    destination.display()
                ),
                first,
            ));
        }

        tracing::info!(
            job_id = %job.id,
            destination = %destination.display(),
            "Replacing existing directory in error area"
        );
        tokio::fs::remove_dir_all(&destination).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to clear {}", destination.display()),
                e,
            )
        })?;

        crate::fs::move_dir(&job.path, &destination)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!(
                        "Failed to move {} to {} after clearing destination",
                        job.path.display(),
                        destination.display()
                    ),
                    e,
                )
            })?;
        Ok(destination)
    }

    /// Mark the job failed, relocate it and add it to the report.
    ///
    /// Store and filesystem errors are logged and noted on the report entry;
    /// they never stop the remaining jobs from being processed.
    pub async fn escalate(
        &self,
        job: &Job,
        message: &str,
        cause: FailureCause,
        report: &mut FailureReport,
    ) {
        if !report.collect(job.clone(), cause) {
            return;
        }

        if let Err(e) = self.store.mark_failed(job.id, message).await {
            tracing::error!(job_id = %job.id, error = %e, "Could not mark job as failed");
            report.add_note(job.id, format!("record not updated: {}", e.message));
        }

        // Record and directory are updated separately; a crash here leaves
        // the record flagged while the directory is still pending.
        tracing::debug!(job_id = %job.id, "Record flagged, relocating directory");

        match self.relocate_to_error_area(job).await {
            Ok(destination) => {
                tracing::info!(
                    job_id = %job.id,
                    destination = %destination.display(),
                    "Moved job to error area"
                );
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Could not move job to error area");
                report.add_note(job.id, format!("not relocated: {}", e.message));
            }
        }
    }

    /// Evict pending jobs whose name already exists in the error area.
    ///
    /// Returns the number of jobs escalated.
    pub async fn sweep_known_bad(
        &self,
        pending: &[Job],
        error_area: &BTreeSet<String>,
        report: &mut FailureReport,
    ) -> usize {
        let mut swept = 0;
        for job in pending.iter().filter(|j| error_area.contains(&j.name)) {
            tracing::warn!(job_id = %job.id, name = %job.name, "Job already present in error area");
            let message = format!("Failed to merge: ({})", self.error_path(job).display());
            self.escalate(job, &message, FailureCause::KnownBad, report).await;
            swept += 1;
        }
        swept
    }
}
