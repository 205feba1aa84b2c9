//! # pagemerge-database
//!
//! PostgreSQL connection management and the job record repositories that
//! implement [`pagemerge_core::traits::JobStateStore`].

pub mod connection;
pub mod escape;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{ItemRepository, MemoryItemStore};
