//! Domain types shared by every PageMerge crate.

pub mod job;

pub use job::{Job, JobId, JobIdError, JobRecord, MergedArtifact};
