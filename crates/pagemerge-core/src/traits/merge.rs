//! External merge operation trait and its failure outcomes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Why a job could not be merged.
///
/// A merge failure is a reported outcome for one job, never an error that
/// aborts the pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeFailure {
    /// The merge operation ran and reported failure.
    #[error("merge operation failed with code {code}: {detail}")]
    Rejected {
        /// Exit or status code returned by the operation.
        code: i32,
        /// Captured diagnostic output.
        detail: String,
    },

    /// The merge operation did not finish in time.
    #[error("merge operation timed out after {seconds}s")]
    Timeout {
        /// The bound that was exceeded.
        seconds: u64,
    },

    /// The merge operation could not be started.
    #[error("merge operation unavailable: {reason}")]
    Unavailable {
        /// Underlying cause.
        reason: String,
    },

    /// The job directory holds no files to merge.
    #[error("no input files in {path}")]
    NoInputs {
        /// The job directory.
        path: PathBuf,
    },

    /// An input path contains the list delimiter and cannot be passed safely.
    #[error("input path {path} contains the delimiter '{delimiter}'")]
    DelimiterCollision {
        /// The offending input file.
        path: PathBuf,
        /// The configured delimiter.
        delimiter: String,
    },

    /// The job directory could not be enumerated.
    #[error("could not list {path}: {reason}")]
    Listing {
        /// The job directory.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// The merged file did not appear before the deadline.
    #[error("merged file {path} did not appear within {seconds}s")]
    ArtifactTimeout {
        /// Expected artifact location.
        path: PathBuf,
        /// The bound that was exceeded.
        seconds: u64,
    },

    /// The merged file exists but the source directory could not be removed.
    #[error("could not remove source directory {path}: {reason}")]
    SourceCleanup {
        /// The job directory.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },
}

/// A blocking call that merges PDFs into one file.
///
/// `inputs` is the delimiter-joined list of absolute input paths in merge
/// order. Alternate implementations (subprocess, remote API) can be swapped
/// in without changing the run loop.
#[async_trait]
pub trait MergeBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Merge `inputs` into `destination`.
    async fn merge(&self, inputs: &str, destination: &Path) -> Result<(), MergeFailure>;
}
