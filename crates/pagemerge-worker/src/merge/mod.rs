//! Merging one job's pages into a single PDF.

pub mod command;
pub mod executor;

pub use command::CommandMergeBackend;
pub use executor::MergeExecutor;
