//! Cycle-level tests for the poller: diffing, state handling and scheduling.

use std::time::Duration;

use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::dispatch::{DispatchOutcome, Dispatcher, JobMap};
use crate::test_utils::{FakeError, RecordingTrigger, ScriptedSource, snapshot_of};
use crate::types::{AggregateSnapshot, BranchPath, JobId};

// ─── Test Helpers ───

fn job_map() -> JobMap {
    JobMap::parse("a/b/main job-main\na/b/dev job-dev\nc/d/main job-cd\n").unwrap()
}

fn make_poller(
    dir: &TempDir,
    source: ScriptedSource,
    trigger: RecordingTrigger,
) -> Poller<ScriptedSource, RecordingTrigger> {
    Poller::new(
        source,
        Dispatcher::new(trigger, job_map()),
        PollerStateFile::in_data_dir(dir.path()),
    )
}

fn triggered(poller: &Poller<ScriptedSource, RecordingTrigger>) -> Vec<JobId> {
    poller.dispatcher().trigger().triggered()
}

/// Snapshot source that never answers.
struct HangingSource;

impl SnapshotSource for HangingSource {
    type Error = FakeError;

    async fn fetch(&self) -> Result<AggregateSnapshot, FakeError> {
        std::future::pending().await
    }
}

// ─── Diff-driven dispatch ───

#[tokio::test]
async fn updated_branch_triggers_exactly_one_job() {
    let dir = tempdir().unwrap();
    let state = PollerStateFile::in_data_dir(dir.path());
    state.save(&snapshot_of(&[("a/b/main", "1")])).unwrap();

    let source = ScriptedSource::new();
    source.push_ok(snapshot_of(&[("a/b/main", "2")]));
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    let outcome = poller.run_cycle().await.unwrap();

    assert_eq!(triggered(&poller), vec![JobId::new("job-main")]);
    let CycleOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {:?}", outcome);
    };
    assert_eq!(report.updated_branches, 1);
    assert_eq!(report.new_branches, 0);
    assert_eq!(report.dispatch.triggered(), 1);
}

#[tokio::test]
async fn first_run_dispatches_every_branch_once() {
    let dir = tempdir().unwrap();
    let current = snapshot_of(&[("a/b/main", "1"), ("a/b/dev", "2"), ("c/d/main", "3")]);
    let source = ScriptedSource::new();
    source.push_ok(current.clone());
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    poller.run_cycle().await.unwrap();

    let mut jobs = triggered(&poller);
    jobs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(
        jobs,
        vec![JobId::new("job-cd"), JobId::new("job-dev"), JobId::new("job-main")]
    );
    assert_eq!(poller.state().load(), current);
}

#[tokio::test]
async fn identical_snapshot_leaves_state_file_untouched() {
    let dir = tempdir().unwrap();
    let snapshot = snapshot_of(&[("a/b/main", "1")]);
    let state = PollerStateFile::in_data_dir(dir.path());
    state.save(&snapshot).unwrap();
    let bytes_before = std::fs::read(state.path()).unwrap();
    let modified_before = std::fs::metadata(state.path()).unwrap().modified().unwrap();

    let source = ScriptedSource::new();
    source.push_ok(snapshot);
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    let outcome = poller.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Unchanged);
    assert!(triggered(&poller).is_empty());
    assert_eq!(std::fs::read(state.path()).unwrap(), bytes_before);
    assert_eq!(
        std::fs::metadata(state.path()).unwrap().modified().unwrap(),
        modified_before
    );
}

#[tokio::test]
async fn unmapped_branch_does_not_block_other_dispatches() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new();
    source.push_ok(snapshot_of(&[("x/y/main", "1"), ("a/b/dev", "2")]));
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    let CycleOutcome::Dispatched(report) = poller.run_cycle().await.unwrap() else {
        panic!("expected dispatch");
    };

    assert_eq!(triggered(&poller), vec![JobId::new("job-dev")]);
    assert_eq!(
        report.dispatch.outcome(&BranchPath::new("x/y/main")),
        Some(&DispatchOutcome::Unmapped)
    );
}

#[tokio::test]
async fn failed_trigger_still_advances_state() {
    let dir = tempdir().unwrap();
    let current = snapshot_of(&[("a/b/main", "1"), ("a/b/dev", "2")]);
    let source = ScriptedSource::new();
    source.push_ok(current.clone()).push_ok(current.clone());
    let trigger = RecordingTrigger::new().with_failing("job-main");
    let mut poller = make_poller(&dir, source, trigger);

    let CycleOutcome::Dispatched(report) = poller.run_cycle().await.unwrap() else {
        panic!("expected dispatch");
    };
    assert_eq!(report.dispatch.failed(), 1);
    assert_eq!(report.dispatch.triggered(), 1);
    assert_eq!(poller.state().load(), current);

    // At most once per observed change: the failed branch is not retried.
    assert_eq!(poller.run_cycle().await.unwrap(), CycleOutcome::Unchanged);
    assert_eq!(triggered(&poller).len(), 2);
}

// ─── Failure handling ───

#[tokio::test]
async fn fetch_failure_aborts_without_writing_state() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new();
    source.push_err("connection refused");
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    let err = poller.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Fetch(ref msg) if msg.contains("connection refused")));
    assert!(triggered(&poller).is_empty());
    assert!(!poller.state().path().exists());
}

#[tokio::test]
async fn fetch_failure_is_not_treated_as_nothing_changed() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new();
    source
        .push_err("503")
        .push_ok(snapshot_of(&[("a/b/main", "1")]));
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    assert!(poller.run_cycle().await.is_err());
    poller.run_cycle().await.unwrap();

    assert_eq!(triggered(&poller), vec![JobId::new("job-main")]);
}

#[tokio::test]
async fn corrupt_state_counts_as_first_run() {
    let dir = tempdir().unwrap();
    let state = PollerStateFile::in_data_dir(dir.path());
    std::fs::write(state.path(), b"not json").unwrap();

    let source = ScriptedSource::new();
    source.push_ok(snapshot_of(&[("a/b/main", "1")]));
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    poller.run_cycle().await.unwrap();

    assert_eq!(triggered(&poller), vec![JobId::new("job-main")]);
    assert_eq!(state.load(), snapshot_of(&[("a/b/main", "1")]));
}

#[tokio::test]
async fn timed_out_cycle_writes_nothing() {
    let dir = tempdir().unwrap();
    let mut poller = Poller::new(
        HangingSource,
        Dispatcher::new(RecordingTrigger::new(), job_map()),
        PollerStateFile::in_data_dir(dir.path()),
    );

    let err = poller
        .run_cycle_bounded(Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, CycleError::TimedOut(_)));
    assert!(!poller.state().path().exists());
}

// ─── Job map reload ───

#[tokio::test]
async fn job_map_is_reloaded_each_cycle() {
    let dir = tempdir().unwrap();
    let map_path = dir.path().join("jobs.conf");
    std::fs::write(&map_path, "a/b/main first\n").unwrap();

    let source = ScriptedSource::new();
    source
        .push_ok(snapshot_of(&[("a/b/main", "1")]))
        .push_ok(snapshot_of(&[("a/b/main", "2")]));
    let mut poller =
        make_poller(&dir, source, RecordingTrigger::new()).with_job_map_reload(&map_path);

    poller.run_cycle().await.unwrap();
    std::fs::write(&map_path, "a/b/main second\n").unwrap();
    poller.run_cycle().await.unwrap();

    assert_eq!(
        triggered(&poller),
        vec![JobId::new("first"), JobId::new("second")]
    );
}

#[tokio::test]
async fn broken_job_map_reload_keeps_previous_mapping() {
    let dir = tempdir().unwrap();
    let map_path = dir.path().join("jobs.conf");
    std::fs::write(&map_path, "a/b/main only-one-field extra\n").unwrap();

    let source = ScriptedSource::new();
    source.push_ok(snapshot_of(&[("a/b/main", "1")]));
    let mut poller =
        make_poller(&dir, source, RecordingTrigger::new()).with_job_map_reload(&map_path);

    poller.run_cycle().await.unwrap();

    assert_eq!(triggered(&poller), vec![JobId::new("job-main")]);
}

// ─── Scheduling ───

#[tokio::test]
async fn cancelled_before_start_runs_no_cycle() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new();
    source.push_ok(snapshot_of(&[("a/b/main", "1")]));
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    poller.run(&PollConfig::new(), shutdown).await;

    assert!(triggered(&poller).is_empty());
    assert!(!poller.state().path().exists());
}

#[tokio::test]
async fn periodic_loop_runs_cycles_until_cancelled() {
    let dir = tempdir().unwrap();
    let source = ScriptedSource::new();
    source
        .push_ok(snapshot_of(&[("a/b/main", "1")]))
        .push_ok(snapshot_of(&[("a/b/main", "2")]));
    let mut poller = make_poller(&dir, source, RecordingTrigger::new());

    let config = PollConfig::new()
        .with_interval(Duration::from_millis(5))
        .with_cycle_timeout(Duration::from_secs(5));
    let shutdown = CancellationToken::new();
    let canceller = {
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            shutdown.cancel();
        }
    };

    // Once the script runs out every fetch fails; the loop must keep going.
    tokio::join!(poller.run(&config, shutdown), canceller);

    assert_eq!(triggered(&poller), vec![JobId::new("job-main"), JobId::new("job-main")]);
    assert_eq!(poller.state().load(), snapshot_of(&[("a/b/main", "2")]));
}
