//! # pagemerge-core
//!
//! Core crate for PageMerge. Contains configuration schemas, the job and
//! job-record domain types, the traits the worker is built against
//! (job state store, merge backend, notifier), and the unified error system.
//!
//! This crate has **no** internal dependencies on other PageMerge crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
