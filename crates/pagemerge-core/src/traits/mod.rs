//! Core traits the worker is built against.
//!
//! Concrete implementations live in `pagemerge-database` (job state store)
//! and `pagemerge-worker` (merge backends, notifiers).

pub mod merge;
pub mod notify;
pub mod store;

pub use merge::{MergeBackend, MergeFailure};
pub use notify::Notifier;
pub use store::JobStateStore;
