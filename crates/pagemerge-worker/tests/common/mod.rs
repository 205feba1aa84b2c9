//! Shared fixtures for run loop integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use pagemerge_core::config::MergeConfig;
use pagemerge_core::error::AppError;
use pagemerge_core::result::AppResult;
use pagemerge_core::traits::{MergeBackend, MergeFailure, Notifier};
use pagemerge_core::types::JobId;
use pagemerge_database::MemoryItemStore;
use pagemerge_worker::report::FailureReporter;
use pagemerge_worker::{
    ArtifactMover, ControlFile, JobRegistry, MergeExecutor, ReconciliationEngine, RunLoop,
    StagnationDetector,
};

/// Merge backend that writes the joined input list as the "PDF".
#[derive(Debug, Default)]
pub struct FakeBackend {
    /// Destinations (file names) whose merge should fail.
    pub failing: Mutex<HashSet<String>>,
    /// Every call as `(inputs, destination)`.
    pub calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeBackend {
    pub fn fail_for(&self, id: i64) {
        self.failing
            .lock()
            .expect("lock")
            .insert(JobId(id).artifact_file_name());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }
}

#[async_trait]
impl MergeBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn merge(&self, inputs: &str, destination: &Path) -> Result<(), MergeFailure> {
        self.calls
            .lock()
            .expect("lock")
            .push((inputs.to_string(), destination.to_path_buf()));

        let file_name = destination
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if self.failing.lock().expect("lock").contains(&file_name) {
            // A crashed merge tool leaves a truncated file behind.
            tokio::fs::write(destination, b"%PDF-trunc")
                .await
                .expect("write partial");
            return Err(MergeFailure::Rejected {
                code: 2,
                detail: "page 3 is damaged".to_string(),
            });
        }

        tokio::fs::write(destination, inputs.as_bytes())
            .await
            .map_err(|e| MergeFailure::Unavailable {
                reason: e.to_string(),
            })
    }
}

/// Notifier that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn bodies(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str) -> AppResult<()> {
        self.sent
            .lock()
            .expect("lock")
            .push((subject.to_string(), body.to_string()));
        if self.fail {
            return Err(AppError::notification("relay refused"));
        }
        Ok(())
    }
}

/// Temp directories plus the collaborators wired into a run loop.
pub struct Fixture {
    pub root: TempDir,
    pub store: MemoryItemStore,
    pub backend: Arc<FakeBackend>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        for dir in ["pending", "error", "output", "temp"] {
            std::fs::create_dir(root.path().join(dir)).expect("mkdir");
        }
        Self {
            root,
            store: MemoryItemStore::new(),
            backend: Arc::new(FakeBackend::default()),
            notifier: Arc::new(notifier),
        }
    }

    pub fn pending(&self) -> PathBuf {
        self.root.path().join("pending")
    }

    pub fn error(&self) -> PathBuf {
        self.root.path().join("error")
    }

    pub fn output(&self) -> PathBuf {
        self.root.path().join("output")
    }

    pub fn temp(&self) -> PathBuf {
        self.root.path().join("temp")
    }

    pub fn control(&self) -> PathBuf {
        self.root.path().join("looper.txt")
    }

    /// Create `<area>/<name>` with `pages` PDF files.
    pub fn add_job(&self, area: &Path, name: &str, pages: usize) -> PathBuf {
        let dir = area.join(name);
        std::fs::create_dir_all(&dir).expect("mkdir");
        for page in 1..=pages {
            std::fs::write(dir.join(format!("{page:03}.pdf")), b"%PDF-1.7").expect("write");
        }
        dir
    }

    pub fn run_loop(&self) -> RunLoop {
        self.run_loop_with(self.notifier.clone())
    }

    /// Same wiring as [`Fixture::run_loop`] with a custom notifier.
    pub fn run_loop_with(&self, notifier: Arc<dyn Notifier>) -> RunLoop {
        let store: Arc<MemoryItemStore> = Arc::new(self.store.clone());
        let merge_config = MergeConfig {
            command: "unused".to_string(),
            args: vec![],
            delimiter: "+".to_string(),
            timeout_seconds: 5,
            artifact_timeout_seconds: 1,
            artifact_poll_interval_ms: 10,
        };
        let engine = ReconciliationEngine::new(store.clone(), self.error());
        let reporter = FailureReporter::new(
            store.clone(),
            notifier,
            engine,
            StagnationDetector::new(chrono::Duration::minutes(30)),
            JobRegistry::new(self.pending(), "item"),
            JobRegistry::new(self.error(), "item"),
            "PDF Merger Error",
        );
        RunLoop::new(
            JobRegistry::new(self.pending(), "item"),
            JobRegistry::new(self.error(), "item"),
            store.clone(),
            MergeExecutor::new(store, self.backend.clone(), self.temp(), &merge_config),
            ArtifactMover::new(self.temp(), self.output()),
            reporter,
            ControlFile::new(self.control()),
            Duration::from_millis(10),
        )
    }
}
