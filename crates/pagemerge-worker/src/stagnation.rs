//! Stagnation detection for jobs that sit in the pending area too long.

use chrono::{DateTime, Duration, Utc};
use tracing;

use pagemerge_core::types::Job;

use crate::reconcile::ReconciliationEngine;
use crate::report::{FailureCause, FailureReport};

/// Flags pending jobs older than a threshold.
#[derive(Debug, Clone, Copy)]
pub struct StagnationDetector {
    threshold: Duration,
}

impl StagnationDetector {
    /// Create a detector with the given age threshold.
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// True iff the job is strictly older than the threshold at `now`.
    pub fn is_stagnant(&self, job: &Job, now: DateTime<Utc>) -> bool {
        job.age(now) > self.threshold
    }

    /// Escalate every stagnant job in `pending`. Returns how many were found.
    pub async fn sweep(
        &self,
        pending: &[Job],
        now: DateTime<Utc>,
        engine: &ReconciliationEngine,
        report: &mut FailureReport,
    ) -> usize {
        let mut found = 0;
        for job in pending.iter().filter(|j| self.is_stagnant(j, now)) {
            tracing::warn!(
                job_id = %job.id,
                age_minutes = job.age(now).num_minutes(),
                "Job is stagnant"
            );
            let message = format!(
                "Failed to merge. Stagnant folder: ({})",
                engine.error_path(job).display()
            );
            engine
                .escalate(job, &message, FailureCause::Stagnant, report)
                .await;
            found += 1;
        }
        found
    }
}
