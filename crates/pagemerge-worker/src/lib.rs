//! Merge pass, reconciliation and failure reporting for PageMerge.
//!
//! This crate provides:
//! - A job registry that lists job directories under a watched root
//! - A merge executor that merges one job through a [`MergeBackend`]
//! - Stagnation detection and known-bad reconciliation against the error area
//! - A failure reporter that marks, relocates and mails failed jobs once per pass
//! - The run loop that drives passes under the control file
//!
//! [`MergeBackend`]: pagemerge_core::traits::MergeBackend

pub mod artifacts;
pub mod control;
pub mod fs;
pub mod merge;
pub mod notify;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod runner;
pub mod stagnation;

pub use artifacts::ArtifactMover;
pub use control::ControlFile;
pub use merge::{CommandMergeBackend, MergeExecutor};
pub use notify::{LogNotifier, SmtpNotifier};
pub use reconcile::ReconciliationEngine;
pub use registry::JobRegistry;
pub use report::{FailureReport, FailureReporter};
pub use runner::{PassSummary, RunLoop};
pub use stagnation::StagnationDetector;
