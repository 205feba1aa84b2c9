//! End-to-end passes against temp directories and the in-memory store.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;

use pagemerge_core::result::AppResult;
use pagemerge_core::traits::{JobStateStore, Notifier};
use pagemerge_core::types::{JobId, JobRecord};

use common::{Fixture, RecordingNotifier};

#[tokio::test]
async fn test_ready_job_is_merged_delivered_and_removed() {
    let fx = Fixture::new();
    let source = fx.add_job(&fx.pending(), "item00000042", 3);
    fx.store.insert_ready(JobId(42), 3).await;

    let summary = fx.run_loop().run_pass().await;

    assert_eq!(summary.merged, 1);
    assert_eq!(summary.delivered, 1);
    assert!(!source.exists());
    assert!(fx.output().join("42.pdf").exists());
    assert!(!fx.temp().join("42.pdf").exists());

    let record = fx.store.record(JobId(42)).await.expect("record");
    assert!(!record.converter_error);
    assert!(record.converter_errormsg.is_empty());

    assert_eq!(summary.report.reported, 0);
    assert!(fx.notifier.bodies().is_empty());
}

#[tokio::test]
async fn test_merge_inputs_are_joined_in_name_order() {
    let fx = Fixture::new();
    fx.add_job(&fx.pending(), "item00000042", 3);
    fx.store.insert_ready(JobId(42), 3).await;

    fx.run_loop().run_pass().await;

    let merged = std::fs::read_to_string(fx.output().join("42.pdf")).expect("read");
    let parts: Vec<&str> = merged.split('+').collect();
    assert_eq!(parts.len(), 3);
    assert!(parts[0].ends_with("item00000042/001.pdf"));
    assert!(parts[2].ends_with("item00000042/003.pdf"));
}

#[tokio::test]
async fn test_incomplete_job_is_left_alone() {
    let fx = Fixture::new();
    let source = fx.add_job(&fx.pending(), "item00000099", 2);
    fx.store.insert_ready(JobId(99), 4).await;

    let summary = fx.run_loop().run_pass().await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(fx.backend.call_count(), 0);
    assert!(source.join("001.pdf").exists());
    let record = fx.store.record(JobId(99)).await.expect("record");
    assert!(!record.converter_error);
    assert!(fx.notifier.bodies().is_empty());
}

#[tokio::test]
async fn test_job_already_in_error_area_is_evicted() {
    let fx = Fixture::new();
    fx.add_job(&fx.pending(), "item00000010", 2);
    fx.add_job(&fx.error(), "item00000010", 1);
    fx.store.insert_ready(JobId(10), 2).await;

    let summary = fx.run_loop().run_pass().await;

    assert_eq!(summary.held, 1);
    assert_eq!(summary.merged, 0);
    assert_eq!(fx.backend.call_count(), 0);
    assert!(!fx.output().join("10.pdf").exists());
    assert_eq!(summary.report.known_bad, 1);
    assert!(!fx.pending().join("item00000010").exists());
    assert!(fx.error().join("item00000010/002.pdf").exists());

    let record = fx.store.record(JobId(10)).await.expect("record");
    assert!(record.converter_error);
    assert!(!record.converted);

    let bodies = fx.notifier.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("item00000010"));
}

#[tokio::test]
async fn test_unreadable_error_area_holds_every_job() {
    let fx = Fixture::new();
    let source = fx.add_job(&fx.pending(), "item00000042", 1);
    fx.store.insert_ready(JobId(42), 1).await;
    std::fs::remove_dir(fx.error()).expect("rmdir");

    let summary = fx.run_loop().run_pass().await;

    assert_eq!(summary.held, 1);
    assert_eq!(summary.merged, 0);
    assert_eq!(fx.backend.call_count(), 0);
    assert!(source.join("001.pdf").exists());
}

#[tokio::test]
async fn test_stagnation_threshold_boundary() {
    let fx = Fixture::new();
    fx.add_job(&fx.pending(), "item00000020", 1);
    fx.store.insert_ready(JobId(20), 9).await;
    let run_loop = fx.run_loop();

    let summary = run_loop
        .run_pass_at(Utc::now() + chrono::Duration::minutes(29))
        .await;
    assert_eq!(summary.report.stagnant, 0);
    assert!(fx.pending().join("item00000020").exists());
    assert!(fx.notifier.bodies().is_empty());

    let summary = run_loop
        .run_pass_at(Utc::now() + chrono::Duration::minutes(31))
        .await;
    assert_eq!(summary.report.stagnant, 1);
    assert!(!fx.pending().join("item00000020").exists());
    assert!(fx.error().join("item00000020").exists());

    let message = fx
        .store
        .read_error_message(JobId(20))
        .await
        .expect("message");
    assert!(message.starts_with("Failed to merge. Stagnant folder: ("));

    let bodies = fx.notifier.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("1) "));
    assert!(bodies[0].contains("[stagnant]"));
    assert!(bodies[0].contains(&message));
}

#[tokio::test]
async fn test_failed_merge_is_marked_relocated_and_reported() {
    let fx = Fixture::new();
    fx.add_job(&fx.pending(), "item00000030", 2);
    fx.add_job(&fx.pending(), "item00000031", 1);
    fx.store.insert_ready(JobId(30), 2).await;
    fx.store.insert_ready(JobId(31), 1).await;
    fx.backend.fail_for(30);

    let summary = fx.run_loop().run_pass().await;

    assert_eq!(summary.merged, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.report.merge_failed, 1);
    assert!(fx.error().join("item00000030/001.pdf").exists());
    assert!(fx.output().join("31.pdf").exists());
    assert!(!fx.output().join("30.pdf").exists());
    assert!(!fx.temp().join("30.pdf").exists());

    let record = fx.store.record(JobId(30)).await.expect("record");
    assert!(record.converter_error);
    assert!(!record.converted);
    assert!(record.converter_errormsg.contains("page 3 is damaged"));

    let bodies = fx.notifier.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].starts_with(pagemerge_worker::report::REPORT_HEADER));
    assert!(bodies[0].contains("item00000030"));
    assert!(!bodies[0].contains("item00000031"));
}

#[tokio::test]
async fn test_job_failing_two_ways_is_reported_once() {
    let fx = Fixture::new();
    fx.add_job(&fx.pending(), "item00000040", 1);
    fx.store.insert_ready(JobId(40), 1).await;
    fx.backend.fail_for(40);

    let summary = fx
        .run_loop()
        .run_pass_at(Utc::now() + chrono::Duration::minutes(45))
        .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.report.stagnant, 1);
    assert_eq!(summary.report.merge_failed, 0);
    assert_eq!(summary.report.reported, 1);

    let bodies = fx.notifier.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0]
            .lines()
            .filter(|line| line.contains("item00000040"))
            .count(),
        1
    );
    assert!(fx.error().join("item00000040").exists());
}

#[tokio::test]
async fn test_notification_failure_keeps_state_changes() {
    let fx = Fixture::with_notifier(RecordingNotifier {
        fail: true,
        ..Default::default()
    });
    fx.add_job(&fx.pending(), "item00000050", 1);
    fx.store.insert_ready(JobId(50), 1).await;
    fx.backend.fail_for(50);

    let summary = fx.run_loop().run_pass().await;

    assert!(!summary.report.notified);
    assert_eq!(fx.notifier.bodies().len(), 1);
    assert!(fx.error().join("item00000050").exists());
    assert!(fx.store.record(JobId(50)).await.expect("record").converter_error);
}

#[tokio::test]
async fn test_unreachable_store_fails_closed() {
    let fx = Fixture::new();
    let source = fx.add_job(&fx.pending(), "item00000060", 1);
    fx.store.insert_ready(JobId(60), 1).await;
    fx.store.set_unavailable(true);

    let summary = fx.run_loop().run_pass().await;

    assert_eq!(summary.merged, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(fx.backend.call_count(), 0);
    assert!(source.exists());
}

#[tokio::test]
async fn test_report_lists_job_even_when_message_lookup_fails() {
    let fx = Fixture::new();
    fx.add_job(&fx.pending(), "item00000070", 1);
    fx.add_job(&fx.pending(), "item00000071", 1);
    fx.store.insert_ready(JobId(71), 5).await;

    fx.run_loop()
        .run_pass_at(Utc::now() + chrono::Duration::minutes(31))
        .await;

    let bodies = fx.notifier.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("1) "));
    assert!(bodies[0].contains("2) "));
    assert!(bodies[0].contains("item00000070"));
    assert!(bodies[0].contains("record not updated"));
    assert!(bodies[0].contains("item00000071"));
}

#[tokio::test]
async fn test_malformed_directory_is_ignored() {
    let fx = Fixture::new();
    let odd = fx.add_job(&fx.pending(), "scratch", 1);

    let summary = fx
        .run_loop()
        .run_pass_at(Utc::now() + chrono::Duration::minutes(90))
        .await;

    assert_eq!(summary.listed, 0);
    assert!(odd.exists());
    assert!(fx.notifier.bodies().is_empty());
}

#[tokio::test]
async fn test_mark_failed_twice_keeps_last_message() {
    let fx = Fixture::new();
    fx.store
        .insert(JobRecord {
            id: JobId(80),
            num_files: 1,
            converter_error: false,
            converter_errormsg: String::new(),
            converted: true,
        })
        .await;

    fx.store.mark_failed(JobId(80), "first").await.expect("mark");
    fx.store
        .mark_failed(JobId(80), r"O'Brien's file\path")
        .await
        .expect("mark");

    let record = fx.store.record(JobId(80)).await.expect("record");
    assert!(record.converter_error);
    assert!(!record.converted);
    assert_eq!(record.converter_errormsg, r"O'Brien's file\path");
}

#[tokio::test]
async fn test_run_once_ignores_control_file() {
    let fx = Fixture::new();
    std::fs::write(fx.control(), "true").expect("write");
    let (_tx, rx) = watch::channel(false);

    let passes = fx.run_loop().run(true, rx).await;
    assert_eq!(passes, 1);
}

#[tokio::test]
async fn test_control_file_false_stops_after_one_pass() {
    let fx = Fixture::new();
    std::fs::write(fx.control(), " False\n").expect("write");
    let (_tx, rx) = watch::channel(false);

    let passes = fx.run_loop().run(false, rx).await;
    assert_eq!(passes, 1);
}

#[tokio::test]
async fn test_control_file_true_runs_another_pass() {
    let fx = Fixture::new();
    std::fs::write(fx.control(), "TRUE").expect("write");
    fx.add_job(&fx.error(), "item00000010", 1);
    fx.add_job(&fx.error(), "item00000011", 1);
    fx.add_job(&fx.pending(), "item00000010", 1);

    let notifier = Arc::new(StagedNotifier {
        pending: fx.pending(),
        control: fx.control(),
        calls: AtomicUsize::new(0),
    });
    let (_tx, rx) = watch::channel(false);

    let passes = tokio::time::timeout(
        Duration::from_secs(10),
        fx.run_loop_with(notifier.clone()).run(false, rx),
    )
    .await
    .expect("loop stopped");

    assert_eq!(passes, 2);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
    assert!(!fx.pending().join("item00000011").exists());
}

#[tokio::test]
async fn test_cancel_stops_repeating_loop() {
    let fx = Fixture::new();
    std::fs::write(fx.control(), "true").expect("write");
    let (tx, rx) = watch::channel(false);
    tx.send(true).expect("send");

    let passes = tokio::time::timeout(Duration::from_secs(10), fx.run_loop().run(false, rx))
        .await
        .expect("loop stopped");

    assert_eq!(passes, 1);
}

/// Feeds the next pass a job that is already in the error area, then turns
/// the control file off once that second job is reported.
#[derive(Debug)]
struct StagedNotifier {
    pending: PathBuf,
    control: PathBuf,
    calls: AtomicUsize,
}

#[async_trait]
impl Notifier for StagedNotifier {
    async fn send(&self, _subject: &str, _body: &str) -> AppResult<()> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => {
                let dir = self.pending.join("item00000011");
                std::fs::create_dir(&dir).expect("mkdir");
                std::fs::write(dir.join("001.pdf"), b"%PDF-1.7").expect("write");
            }
            _ => std::fs::write(&self.control, "false").expect("write"),
        }
        Ok(())
    }
}
