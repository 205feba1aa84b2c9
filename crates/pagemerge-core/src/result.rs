//! Convenience result type alias for PageMerge.

use crate::error::AppError;

/// A specialized `Result` type for PageMerge operations.
pub type AppResult<T> = Result<T, AppError>;
