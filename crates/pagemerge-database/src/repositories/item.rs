//! PostgreSQL job record repository.

use async_trait::async_trait;
use sqlx::PgPool;

use pagemerge_core::error::{AppError, ErrorKind};
use pagemerge_core::result::AppResult;
use pagemerge_core::traits::JobStateStore;
use pagemerge_core::types::{JobId, JobRecord};

use crate::escape::{LiteralMode, escape_literal};

/// Repository over the items table (`id`, `num_files`, `converter_error`,
/// `converter_errormsg`, `converted`).
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: PgPool,
    /// Validated, schema-qualified table name.
    table: String,
}

impl ItemRepository {
    /// Create a new repository. `table` must already be validated by
    /// `DatabaseConfig`.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    fn not_found(id: JobId) -> AppError {
        AppError::not_found(format!("No record for job {id}"))
    }
}

#[async_trait]
impl JobStateStore for ItemRepository {
    async fn fetch_record(&self, id: JobId) -> AppResult<Option<JobRecord>> {
        // A NULL error flag is treated as flagged so the job is never merged.
        let sql = format!(
            "SELECT COALESCE(num_files, -1), COALESCE(converter_error, true), \
             COALESCE(converter_errormsg, ''), COALESCE(converted, false) \
             FROM {} WHERE id = $1",
            self.table
        );

        let row = sqlx::query_as::<_, (i32, bool, String, bool)>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read job record", e))?;

        Ok(row.map(
            |(num_files, converter_error, converter_errormsg, converted)| JobRecord {
                id,
                num_files,
                converter_error,
                converter_errormsg,
                converted,
            },
        ))
    }

    async fn mark_succeeded(&self, id: JobId) -> AppResult<()> {
        let sql = format!(
            "UPDATE {} SET converter_error = false, converter_errormsg = '' WHERE id = $1",
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to mark job as succeeded", e)
            })?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: JobId, message: &str) -> AppResult<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
        })?;

        // The literal is escaped for the session it will be parsed in.
        let setting = sqlx::query_scalar::<_, String>(
            "SELECT current_setting('standard_conforming_strings')",
        )
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "Failed to read standard_conforming_strings",
                e,
            )
        })?;
        let mode = LiteralMode::from_setting(&setting);

        let sql = format!(
            "UPDATE {} SET converted = false, converter_error = true, \
             converter_errormsg = '{}' WHERE id = $1",
            self.table,
            escape_literal(message, mode)
        );

        let result = sqlx::query(&sql)
            .bind(id.value())
            .persistent(false)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to mark job as failed", e)
            })?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    async fn read_error_message(&self, id: JobId) -> AppResult<String> {
        let sql = format!(
            "SELECT COALESCE(converter_errormsg, '') FROM {} WHERE id = $1",
            self.table
        );

        sqlx::query_scalar::<_, String>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to read error message", e)
            })?
            .ok_or_else(|| Self::not_found(id))
    }
}
