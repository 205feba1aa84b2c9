//! Job state store trait.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::job::{Job, JobId, JobRecord};

/// Authoritative per-job record storage.
///
/// Only the merge executor (success) and the failure paths (reconciliation,
/// stagnation, failed merges) may change `converter_error` or `converted`.
/// Implementations must not hold a connection between calls.
#[async_trait]
pub trait JobStateStore: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch the record for a job, `None` if no row exists.
    async fn fetch_record(&self, id: JobId) -> AppResult<Option<JobRecord>>;

    /// Clear the error flag and message. Leaves `converted` and `num_files` alone.
    async fn mark_succeeded(&self, id: JobId) -> AppResult<()>;

    /// Flag the job as failed with `message`. The latest message wins.
    async fn mark_failed(&self, id: JobId, message: &str) -> AppResult<()>;

    /// Last recorded error message.
    async fn read_error_message(&self, id: JobId) -> AppResult<String>;

    /// Whether the job may be merged now.
    ///
    /// Fails closed: a missing record or any store error yields `false`.
    async fn is_safe_to_merge(&self, job: &Job) -> bool {
        match self.fetch_record(job.id).await {
            Ok(Some(record)) => {
                let safe = record.permits_merge(job.file_count);
                if !safe {
                    tracing::debug!(
                        job_id = %job.id,
                        expected = record.num_files,
                        on_disk = job.file_count,
                        converter_error = record.converter_error,
                        "Job not ready to merge"
                    );
                }
                safe
            }
            Ok(None) => {
                tracing::warn!(job_id = %job.id, path = %job.path.display(), "No record for job");
                false
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Could not check job record");
                false
            }
        }
    }
}
