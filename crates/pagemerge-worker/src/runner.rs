//! Run loop: drives merge passes until the control file says stop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing;

use pagemerge_core::traits::{JobStateStore, MergeFailure};
use pagemerge_core::types::Job;

use crate::artifacts::ArtifactMover;
use crate::control::ControlFile;
use crate::merge::MergeExecutor;
use crate::registry::JobRegistry;
use crate::report::{FailureReporter, PassReport};

/// Outcome counts for one full pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Pending jobs seen at pass start.
    pub listed: usize,
    /// Jobs merged and removed from the pending area.
    pub merged: usize,
    /// Jobs not yet safe to merge.
    pub skipped: usize,
    /// Jobs held back because their name is already in the error area.
    pub held: usize,
    /// Jobs whose merge failed.
    pub failed: usize,
    /// Artifacts moved to the output area.
    pub delivered: usize,
    /// Result of the reporting step.
    pub report: PassReport,
}

/// Sequential merge pass driver.
#[derive(Debug)]
pub struct RunLoop {
    registry: JobRegistry,
    error_area: JobRegistry,
    store: Arc<dyn JobStateStore>,
    executor: MergeExecutor,
    mover: ArtifactMover,
    reporter: FailureReporter,
    control: ControlFile,
    pass_delay: Duration,
}

impl RunLoop {
    /// Create a new run loop.
    pub fn new(
        registry: JobRegistry,
        error_area: JobRegistry,
        store: Arc<dyn JobStateStore>,
        executor: MergeExecutor,
        mover: ArtifactMover,
        reporter: FailureReporter,
        control: ControlFile,
        pass_delay: Duration,
    ) -> Self {
        Self {
            registry,
            error_area,
            store,
            executor,
            mover,
            reporter,
            control,
            pass_delay,
        }
    }

    /// Run passes until the control file stops asking for more, `once` is
    /// set, or the cancel signal fires. Cancellation takes effect between
    /// passes.
    pub async fn run(&self, once: bool, mut cancel: watch::Receiver<bool>) -> usize {
        let mut passes = 0;
        loop {
            let summary = self.run_pass().await;
            passes += 1;
            tracing::info!(
                pass = passes,
                listed = summary.listed,
                merged = summary.merged,
                skipped = summary.skipped,
                held = summary.held,
                failed = summary.failed,
                delivered = summary.delivered,
                reported = summary.report.reported,
                "Pass complete"
            );

            let cancelled = *cancel.borrow();
            if once || cancelled || !self.control.should_repeat().await {
                break;
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can cancel any more.
                        tokio::time::sleep(self.pass_delay).await;
                    } else if *cancel.borrow() {
                        tracing::info!("Shutdown requested, stopping after pass {}", passes);
                        break;
                    }
                }
                _ = tokio::time::sleep(self.pass_delay) => {}
            }
        }
        passes
    }

    /// One pass using the current time.
    pub async fn run_pass(&self) -> PassSummary {
        self.run_pass_at(Utc::now()).await
    }

    /// One pass, judging stagnation against `now`.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> PassSummary {
        let mut summary = PassSummary::default();

        let jobs = match self.registry.list_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Could not list pending jobs");
                Vec::new()
            }
        };
        summary.listed = jobs.len();

        // Names already in the error area are left for reconciliation. If the
        // error area cannot be read, nothing is merged this pass.
        let known_bad = match self.error_area.list_names().await {
            Ok(names) => Some(names),
            Err(e) => {
                tracing::error!(error = %e, "Could not list error area, holding all jobs");
                None
            }
        };

        let mut failed_mergers: Vec<(Job, MergeFailure)> = Vec::new();
        for job in jobs {
            let held = known_bad
                .as_ref()
                .is_none_or(|names| names.contains(&job.name));
            if held {
                tracing::info!(job_id = %job.id, "Job name already in error area, not merging");
                summary.held += 1;
                continue;
            }
            if !self.store.is_safe_to_merge(&job).await {
                summary.skipped += 1;
                continue;
            }
            match self.executor.merge_one(&job).await {
                Ok(_) => summary.merged += 1,
                Err(failure) => {
                    tracing::error!(job_id = %job.id, path = %job.path.display(), %failure, "Merge failed");
                    summary.failed += 1;
                    failed_mergers.push((job, failure));
                }
            }
        }

        summary.delivered = match self.mover.deliver_all().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Could not deliver merged files");
                0
            }
        };

        summary.report = self.reporter.report_pass(failed_mergers, now).await;
        summary
    }
}
