//! Job registry: lists job directories under a watched root.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing;

use pagemerge_core::error::{AppError, ErrorKind};
use pagemerge_core::result::AppResult;
use pagemerge_core::types::{Job, JobId};

/// Lists the directories under one root as [`Job`] descriptors.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    root: PathBuf,
    prefix: String,
}

impl JobRegistry {
    /// Create a registry over `root` for directories named `<prefix><digits>`.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    /// Every job directory currently under the root.
    ///
    /// Directories whose names do not parse as a job id are logged and
    /// skipped; a directory that disappears mid-listing is skipped silently.
    pub async fn list_jobs(&self) -> AppResult<Vec<Job>> {
        let root = self.absolute_root().await;
        let mut entries = tokio::fs::read_dir(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to list {}", root.display()),
                e,
            )
        })?;

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let id = match JobId::parse_dir_name(&name, &self.prefix) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Skipping directory");
                    continue;
                }
            };

            match inspect(id, name, entry.path()).await {
                Ok(job) => jobs.push(job),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to inspect job directory");
                }
            }
        }

        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    /// Names of all directories under the root, job-shaped or not.
    pub async fn list_names(&self) -> AppResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to list {}", self.root.display()),
                e,
            )
        })?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                names.insert(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(names)
    }

    async fn absolute_root(&self) -> PathBuf {
        tokio::fs::canonicalize(&self.root)
            .await
            .unwrap_or_else(|_| self.root.clone())
    }
}

async fn inspect(id: JobId, name: String, path: PathBuf) -> std::io::Result<Job> {
    let metadata = tokio::fs::metadata(&path).await?;
    let created = metadata.created().or_else(|_| metadata.modified())?;
    let file_count = crate::fs::list_files(&path).await?.len();

    Ok(Job {
        id,
        name,
        path,
        file_count,
        created_at: DateTime::<Utc>::from(created),
    })
}
