//! Job, job record and merged artifact types.
//!
//! A job is one directory under the pending area. Its numeric id is encoded in
//! the directory name (`item00000042` is job 42) and keys the database record
//! that tracks the job's conversion state.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Numeric job identifier, the primary key of the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub i64);

/// Reasons a directory name does not name a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobIdError {
    /// The name does not start with the configured prefix.
    #[error("'{name}' does not start with prefix '{prefix}'")]
    MissingPrefix {
        /// The offending directory name.
        name: String,
        /// The expected prefix.
        prefix: String,
    },

    /// Nothing follows the prefix.
    #[error("'{name}' has no id after the prefix")]
    EmptyId {
        /// The offending directory name.
        name: String,
    },

    /// The suffix is not made of ASCII digits.
    #[error("'{name}' has a non-numeric id suffix '{suffix}'")]
    NotNumeric {
        /// The offending directory name.
        name: String,
        /// The part after the prefix.
        suffix: String,
    },

    /// The suffix does not fit in an `i64`.
    #[error("'{name}' has an id that is out of range")]
    OutOfRange {
        /// The offending directory name.
        name: String,
    },
}

impl JobId {
    /// Parse the id from a job directory name such as `item00000042`.
    pub fn parse_dir_name(name: &str, prefix: &str) -> Result<Self, JobIdError> {
        let suffix = name
            .strip_prefix(prefix)
            .ok_or_else(|| JobIdError::MissingPrefix {
                name: name.to_string(),
                prefix: prefix.to_string(),
            })?;

        if suffix.is_empty() {
            return Err(JobIdError::EmptyId {
                name: name.to_string(),
            });
        }
        if !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(JobIdError::NotNumeric {
                name: name.to_string(),
                suffix: suffix.to_string(),
            });
        }

        suffix
            .parse::<i64>()
            .map(Self)
            .map_err(|_| JobIdError::OutOfRange {
                name: name.to_string(),
            })
    }

    /// Return the inner integer.
    pub fn value(self) -> i64 {
        self.0
    }

    /// File name of the merged PDF for this job.
    pub fn artifact_file_name(self) -> String {
        format!("{}.pdf", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job directory as observed on disk at listing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Id parsed from the directory name.
    pub id: JobId,
    /// Directory name (also the reconciliation key).
    pub name: String,
    /// Absolute directory path.
    pub path: PathBuf,
    /// Number of regular files present in the directory.
    pub file_count: usize,
    /// Directory creation time (modification time where creation is not recorded).
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Age of the job directory relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Path this job's directory would have under `root`.
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }
}

/// The authoritative per-job record held by the job state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    /// Primary key.
    pub id: JobId,
    /// Number of files the converter is expected to produce.
    pub num_files: i32,
    /// Whether conversion failed upstream or the job was flagged here.
    pub converter_error: bool,
    /// Last recorded error message.
    pub converter_errormsg: String,
    /// Whether the job has been fully converted.
    pub converted: bool,
}

impl JobRecord {
    /// True iff every expected file is on disk and no error is flagged.
    pub fn permits_merge(&self, file_count: usize) -> bool {
        !self.converter_error && usize::try_from(self.num_files).ok() == Some(file_count)
    }
}

/// A merged PDF written to the temp merge area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedArtifact {
    /// Job the artifact belongs to.
    pub job_id: JobId,
    /// Location in the temp merge area.
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(num_files: i32, converter_error: bool) -> JobRecord {
        JobRecord {
            id: JobId(1),
            num_files,
            converter_error,
            converter_errormsg: String::new(),
            converted: !converter_error,
        }
    }

    #[test]
    fn test_parse_dir_name() {
        assert_eq!(JobId::parse_dir_name("item00000042", "item"), Ok(JobId(42)));
        assert_eq!(JobId::parse_dir_name("item0", "item"), Ok(JobId(0)));
    }

    #[test]
    fn test_parse_dir_name_rejects_malformed() {
        assert!(matches!(
            JobId::parse_dir_name("folder42", "item"),
            Err(JobIdError::MissingPrefix { .. })
        ));
        assert!(matches!(
            JobId::parse_dir_name("item", "item"),
            Err(JobIdError::EmptyId { .. })
        ));
        assert!(matches!(
            JobId::parse_dir_name("item12a", "item"),
            Err(JobIdError::NotNumeric { .. })
        ));
        assert!(matches!(
            JobId::parse_dir_name("item-12", "item"),
            Err(JobIdError::NotNumeric { .. })
        ));
        assert!(matches!(
            JobId::parse_dir_name("item99999999999999999999", "item"),
            Err(JobIdError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_artifact_file_name_drops_padding() {
        let id = JobId::parse_dir_name("item00000042", "item").expect("parse");
        assert_eq!(id.artifact_file_name(), "42.pdf");
    }

    #[test]
    fn test_permits_merge_truth_table() {
        assert!(record(3, false).permits_merge(3));
        assert!(!record(3, false).permits_merge(2));
        assert!(!record(4, false).permits_merge(2));
        assert!(!record(3, true).permits_merge(3));
        assert!(!record(2, true).permits_merge(3));
        assert!(!record(-1, false).permits_merge(0));
    }
}
