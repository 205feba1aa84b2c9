//! In-memory job record store.
//!
//! Mirrors the semantics of [`super::ItemRepository`] without a server.
//! Used by tests and dry runs; can be switched into an "unavailable" mode to
//! exercise the fail-closed paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use pagemerge_core::error::AppError;
use pagemerge_core::result::AppResult;
use pagemerge_core::traits::JobStateStore;
use pagemerge_core::types::{JobId, JobRecord};

/// Job state store backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryItemStore {
    records: Arc<RwLock<HashMap<JobId, JobRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub async fn insert(&self, record: JobRecord) {
        self.records.write().await.insert(record.id, record);
    }

    /// Insert a fresh, converted record expecting `num_files` files.
    pub async fn insert_ready(&self, id: JobId, num_files: i32) {
        self.insert(JobRecord {
            id,
            num_files,
            converter_error: false,
            converter_errormsg: String::new(),
            converted: true,
        })
        .await;
    }

    /// Snapshot of a record.
    pub async fn record(&self, id: JobId) -> Option<JobRecord> {
        self.records.read().await.get(&id).cloned()
    }

    /// Make every call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::database("store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStateStore for MemoryItemStore {
    async fn fetch_record(&self, id: JobId) -> AppResult<Option<JobRecord>> {
        self.check_available()?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn mark_succeeded(&self, id: JobId) -> AppResult<()> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("No record for job {id}")))?;
        record.converter_error = false;
        record.converter_errormsg.clear();
        Ok(())
    }

    async fn mark_failed(&self, id: JobId, message: &str) -> AppResult<()> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("No record for job {id}")))?;
        record.converted = false;
        record.converter_error = true;
        record.converter_errormsg = message.to_string();
        Ok(())
    }

    async fn read_error_message(&self, id: JobId) -> AppResult<String> {
        self.check_available()?;
        self.records
            .read()
            .await
            .get(&id)
            .map(|r| r.converter_errormsg.clone())
            .ok_or_else(|| AppError::not_found(format!("No record for job {id}")))
    }
}
