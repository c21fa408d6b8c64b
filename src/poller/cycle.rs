//! One poll cycle and the periodic loop around it.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::config::PollConfig;
use super::diff::{ChangeKind, changed_branches};
use super::source::SnapshotSource;
use super::state::PollerStateFile;
use crate::dispatch::{BuildTrigger, DispatchReport, Dispatcher, JobMap};
use crate::persistence::PersistError;
use crate::types::BranchPath;

/// Errors that abandon a cycle. Poller State is never written when a cycle
/// fails.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("cannot fetch snapshot: {0}")]
    Fetch(String),

    #[error("cannot persist poller state: {0}")]
    PersistState(#[from] PersistError),

    #[error("cycle exceeded {0:?}")]
    TimedOut(Duration),

    #[error("poller state task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The fetched snapshot equals Poller State. Nothing dispatched or written.
    Unchanged,
    /// Changed branches were dispatched and Poller State replaced.
    Dispatched(CycleReport),
}

/// Per-cycle summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub new_branches: usize,
    pub updated_branches: usize,
    pub dispatch: DispatchReport,
}

impl CycleReport {
    fn log(&self) {
        info!(
            changed = self.dispatch.changed(),
            new = self.new_branches,
            updated = self.updated_branches,
            triggered = self.dispatch.triggered(),
            unmapped = self.dispatch.unmapped(),
            unknown = self.dispatch.unknown(),
            failed = self.dispatch.failed(),
            "Poll cycle complete"
        );
    }
}

/// Compares the published snapshot against Poller State and dispatches
/// builds for changed branches.
pub struct Poller<S, T> {
    source: S,
    dispatcher: Dispatcher<T>,
    state: PollerStateFile,
    job_map_path: Option<PathBuf>,
}

impl<S, T> Poller<S, T>
where
    S: SnapshotSource + Sync,
    T: BuildTrigger + Sync,
{
    pub fn new(source: S, dispatcher: Dispatcher<T>, state: PollerStateFile) -> Self {
        Poller {
            source,
            dispatcher,
            state,
            job_map_path: None,
        }
    }

    /// Re-reads the Job Map from `path` at the start of every cycle.
    pub fn with_job_map_reload(mut self, path: impl Into<PathBuf>) -> Self {
        self.job_map_path = Some(path.into());
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    pub fn state(&self) -> &PollerStateFile {
        &self.state
    }

    /// Runs one cycle to completion.
    ///
    /// Poller State is written only after every dispatch attempt has been
    /// made, so an interrupted cycle re-dispatches next time rather than
    /// losing a change.
    #[instrument(skip_all)]
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        self.reload_job_map().await;

        let current = self
            .source
            .fetch()
            .await
            .map_err(|e| CycleError::Fetch(e.to_string()))?;
        let state = self.state.clone();
        let prior = tokio::task::spawn_blocking(move || state.load()).await?;

        if current == prior {
            debug!(branches = current.len(), "Snapshot unchanged since last cycle");
            return Ok(CycleOutcome::Unchanged);
        }

        let changes = changed_branches(&current, &prior);
        let mut report = CycleReport::default();
        for change in &changes {
            match change.kind {
                ChangeKind::New => report.new_branches += 1,
                ChangeKind::Updated => report.updated_branches += 1,
            }
        }
        let changed: Vec<BranchPath> = changes.into_iter().map(|c| c.branch_path).collect();

        report.dispatch = self.dispatcher.dispatch_all(&changed).await;
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || state.save(&current)).await??;

        report.log();
        Ok(CycleOutcome::Dispatched(report))
    }

    /// Runs one cycle, abandoning it after `limit`.
    pub async fn run_cycle_bounded(&mut self, limit: Duration) -> Result<CycleOutcome, CycleError> {
        match tokio::time::timeout(limit, self.run_cycle()).await {
            Ok(result) => result,
            Err(_) => Err(CycleError::TimedOut(limit)),
        }
    }

    /// Runs cycles every `config.interval` until `shutdown` is cancelled.
    ///
    /// Cycles never overlap. Cancellation is observed between cycles only, so
    /// an in-flight cycle always finishes its dispatches.
    pub async fn run(&mut self, config: &PollConfig, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = config.interval.as_secs(),
            cycle_timeout_secs = config.cycle_timeout.as_secs(),
            "Poller started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping poller");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_cycle_bounded(config.cycle_timeout).await {
                warn!(error = %e, "Poll cycle abandoned");
            }
        }
    }

    async fn reload_job_map(&mut self) {
        let Some(path) = self.job_map_path.clone() else {
            return;
        };
        let load_path = path.clone();
        let loaded = tokio::task::spawn_blocking(move || JobMap::load(&load_path)).await;
        match loaded {
            Ok(Ok(job_map)) => {
                if &job_map != self.dispatcher.job_map() {
                    info!(entries = job_map.len(), "Job map reloaded");
                }
                self.dispatcher.replace_job_map(job_map);
            }
            Ok(Err(e)) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Cannot reload job map, keeping previous mapping"
                );
            }
            Err(e) => {
                warn!(error = %e, "Job map reload task failed, keeping previous mapping");
            }
        }
    }
}
