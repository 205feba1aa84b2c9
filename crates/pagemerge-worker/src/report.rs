//! Failure reporting: one consolidated report per pass.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tracing;

use pagemerge_core::traits::{JobStateStore, MergeFailure, Notifier};
use pagemerge_core::types::{Job, JobId};

use crate::reconcile::ReconciliationEngine;
use crate::registry::JobRegistry;
use crate::stagnation::StagnationDetector;

/// First line of every report body.
pub const REPORT_HEADER: &str = "Errors occurred while attempting to merge the following folders:";

/// Why a job ended up in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The job's name was already present in the error area.
    KnownBad,
    /// The job sat in the pending area past the threshold.
    Stagnant,
    /// The merge itself failed.
    MergeFailed(MergeFailure),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KnownBad => write!(f, "already in error area"),
            Self::Stagnant => write!(f, "stagnant"),
            Self::MergeFailed(failure) => write!(f, "merge failed: {failure}"),
        }
    }
}

/// One reported job.
#[derive(Debug, Clone)]
pub struct FailureEntry {
    /// The job as it was listed in the pending area.
    pub job: Job,
    /// Why it was reported.
    pub cause: FailureCause,
    /// Problems hit while escalating (store or relocation failures).
    pub notes: Vec<String>,
}

/// The pass-scoped list of failed jobs, one entry per job id.
#[derive(Debug, Default)]
pub struct FailureReport {
    entries: Vec<FailureEntry>,
    seen: HashSet<JobId>,
}

impl FailureReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job. Returns `false` if the job was already reported this pass.
    pub fn collect(&mut self, job: Job, cause: FailureCause) -> bool {
        if !self.seen.insert(job.id) {
            tracing::debug!(job_id = %job.id, %cause, "Job already reported this pass");
            return false;
        }
        self.entries.push(FailureEntry {
            job,
            cause,
            notes: Vec::new(),
        });
        true
    }

    /// Attach a note to an already collected job.
    pub fn add_note(&mut self, id: JobId, note: String) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.job.id == id) {
            entry.notes.push(note);
        }
    }

    /// Whether `id` is already in the report.
    pub fn contains(&self, id: JobId) -> bool {
        self.seen.contains(&id)
    }

    /// Entries in the order they were collected.
    pub fn entries(&self) -> &[FailureEntry] {
        &self.entries
    }

    /// Number of reported jobs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counts for one `report_pass` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Pending jobs already present in the error area.
    pub known_bad: usize,
    /// Pending jobs past the stagnation threshold.
    pub stagnant: usize,
    /// Failed merges escalated by this call.
    pub merge_failed: usize,
    /// Distinct jobs in the report.
    pub reported: usize,
    /// Whether a notification was handed off successfully.
    pub notified: bool,
}

/// Marks, relocates and reports every job that failed during a pass.
#[derive(Debug)]
pub struct FailureReporter {
    store: Arc<dyn JobStateStore>,
    notifier: Arc<dyn Notifier>,
    engine: ReconciliationEngine,
    detector: StagnationDetector,
    pending: JobRegistry,
    error_area: JobRegistry,
    subject_prefix: String,
}

impl FailureReporter {
    /// Create a new failure reporter.
    pub fn new(
        store: Arc<dyn JobStateStore>,
        notifier: Arc<dyn Notifier>,
        engine: ReconciliationEngine,
        detector: StagnationDetector,
        pending: JobRegistry,
        error_area: JobRegistry,
        subject_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            engine,
            detector,
            pending,
            error_area,
            subject_prefix: subject_prefix.into(),
        }
    }

    /// Reconcile, detect stagnation, escalate failed merges and send one report.
    pub async fn report_pass(
        &self,
        failed_mergers: Vec<(Job, MergeFailure)>,
        now: DateTime<Utc>,
    ) -> PassReport {
        let mut report = FailureReport::new();
        let mut summary = PassReport::default();

        match (self.pending.list_jobs().await, self.error_area.list_names().await) {
            (Ok(pending), Ok(error_names)) => {
                summary.known_bad = self
                    .engine
                    .sweep_known_bad(&pending, &error_names, &mut report)
                    .await;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Skipping error-area reconciliation");
            }
        }

        // Re-list so jobs evicted above are not seen twice.
        match self.pending.list_jobs().await {
            Ok(pending) => {
                summary.stagnant = self
                    .detector
                    .sweep(&pending, now, &self.engine, &mut report)
                    .await;
            }
            Err(e) => tracing::error!(error = %e, "Skipping stagnation sweep"),
        }

        for (job, failure) in failed_mergers {
            if report.contains(job.id) {
                continue;
            }
            let message = format!(
                "Failed to merge: {failure} ({})",
                self.engine.error_path(&job).display()
            );
            self.engine
                .escalate(&job, &message, FailureCause::MergeFailed(failure), &mut report)
                .await;
            summary.merge_failed += 1;
        }

        summary.reported = report.len();
        if !report.is_empty() {
            let body = self.render(report.entries()).await;
            summary.notified = self.send(&body).await;
        }
        summary
    }

    /// Render the numbered report body.
    ///
    /// Each line carries the store's current error message for the job; a
    /// failed lookup leaves the message out and rendering continues.
    pub async fn render(&self, entries: &[FailureEntry]) -> String {
        let mut body = String::from(REPORT_HEADER);
        body.push('\n');

        for (index, entry) in entries.iter().enumerate() {
            body.push_str(&format!(
                "\n{}) {} [{}]",
                index + 1,
                entry.job.path.display(),
                entry.cause
            ));

            match self.store.read_error_message(entry.job.id).await {
                Ok(message) => body.push_str(&format!(" | {message}")),
                Err(e) => {
                    tracing::error!(job_id = %entry.job.id, error = %e, "Could not read error message");
                }
            }

            for note in &entry.notes {
                body.push_str(&format!(" ({note})"));
            }
        }
        body
    }

    /// Hand the report to the notifier. Failures are logged, never retried.
    pub async fn send(&self, body: &str) -> bool {
        let subject = format!(
            "{}: {}",
            self.subject_prefix,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        match self.notifier.send(&subject, body).await {
            Ok(()) => {
                tracing::info!(%subject, "Failure report sent");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send failure report");
                false
            }
        }
    }
}
