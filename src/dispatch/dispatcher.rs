//! Per-branch dispatch with failures contained to the branch.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use super::job_map::JobMap;
use super::trigger::BuildTrigger;
use crate::types::{BranchPath, JobId};

/// What happened to one changed branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A build of the mapped job was started.
    Triggered(JobId),
    /// The branch has no Job Map entry.
    Unmapped,
    /// The mapped job is absent from the build system's registry.
    UnknownJob(JobId),
    /// The trigger call failed. Not retried.
    Failed { job: JobId, error: String },
}

/// Outcome of every branch handed to [`Dispatcher::dispatch_all`], in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<(BranchPath, DispatchOutcome)>,
}

impl DispatchReport {
    pub fn changed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn triggered(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Triggered(_)))
    }

    pub fn unmapped(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Unmapped))
    }

    pub fn unknown(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::UnknownJob(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Failed { .. }))
    }

    pub fn outcome(&self, branch_path: &BranchPath) -> Option<&DispatchOutcome> {
        self.outcomes
            .iter()
            .find(|(path, _)| path == branch_path)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&DispatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Resolves changed branches to jobs and triggers them one at a time.
#[derive(Debug)]
pub struct Dispatcher<T> {
    trigger: T,
    job_map: JobMap,
}

impl<T: BuildTrigger + Sync> Dispatcher<T> {
    pub fn new(trigger: T, job_map: JobMap) -> Self {
        Dispatcher { trigger, job_map }
    }

    pub fn trigger(&self) -> &T {
        &self.trigger
    }

    pub fn job_map(&self) -> &JobMap {
        &self.job_map
    }

    pub fn replace_job_map(&mut self, job_map: JobMap) {
        self.job_map = job_map;
    }

    /// Dispatches each changed branch. Never fails: every per-branch problem
    /// is logged and recorded in the report.
    ///
    /// The known-jobs registry is consulted once per batch. If it cannot be
    /// fetched the registry check is skipped for the batch.
    pub async fn dispatch_all(&self, changed: &[BranchPath]) -> DispatchReport {
        let mut report = DispatchReport::default();
        if changed.is_empty() {
            return report;
        }

        let registry = match self.trigger.known_jobs().await {
            Ok(registry) => registry,
            Err(e) => {
                warn!(error = %e, "Cannot fetch known-jobs registry, skipping job check");
                None
            }
        };

        for branch_path in changed {
            let outcome = self.dispatch_one(branch_path, registry.as_ref()).await;
            report.outcomes.push((branch_path.clone(), outcome));
        }
        report
    }

    async fn dispatch_one(
        &self,
        branch_path: &BranchPath,
        registry: Option<&HashSet<JobId>>,
    ) -> DispatchOutcome {
        let Some(job) = self.job_map.get(branch_path) else {
            warn!(branch_path = %branch_path, "Branch changed but has no job mapping");
            return DispatchOutcome::Unmapped;
        };

        if let Some(known) = registry
            && !known.contains(job)
        {
            warn!(branch_path = %branch_path, job = %job, "Mapped job is unknown to the build system");
            return DispatchOutcome::UnknownJob(job.clone());
        }

        debug!(branch_path = %branch_path, job = %job, "Triggering build");
        match self.trigger.trigger(job).await {
            Ok(()) => {
                info!(branch_path = %branch_path, job = %job, "Build triggered");
                DispatchOutcome::Triggered(job.clone())
            }
            Err(e) => {
                error!(branch_path = %branch_path, job = %job, error = %e, "Build trigger failed");
                DispatchOutcome::Failed {
                    job: job.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingTrigger;

    fn paths(items: &[&str]) -> Vec<BranchPath> {
        items.iter().map(|p| BranchPath::new(*p)).collect()
    }

    fn job_map() -> JobMap {
        JobMap::parse("a/b/main job-main\na/b/dev job-dev\nc/d/main job-cd\n").unwrap()
    }

    #[tokio::test]
    async fn triggers_mapped_branches_once_each() {
        let dispatcher = Dispatcher::new(RecordingTrigger::new(), job_map());
        let report = dispatcher
            .dispatch_all(&paths(&["a/b/main", "c/d/main"]))
            .await;

        assert_eq!(report.changed(), 2);
        assert_eq!(report.triggered(), 2);
        assert_eq!(
            dispatcher.trigger().triggered(),
            vec![JobId::new("job-main"), JobId::new("job-cd")]
        );
    }

    #[tokio::test]
    async fn unmapped_branch_does_not_block_others() {
        let dispatcher = Dispatcher::new(RecordingTrigger::new(), job_map());
        let report = dispatcher
            .dispatch_all(&paths(&["x/y/main", "a/b/dev"]))
            .await;

        assert_eq!(
            report.outcome(&BranchPath::new("x/y/main")),
            Some(&DispatchOutcome::Unmapped)
        );
        assert_eq!(report.unmapped(), 1);
        assert_eq!(dispatcher.trigger().triggered(), vec![JobId::new("job-dev")]);
    }

    #[tokio::test]
    async fn failed_trigger_continues_batch() {
        let trigger = RecordingTrigger::new().with_failing("job-main");
        let dispatcher = Dispatcher::new(trigger, job_map());
        let report = dispatcher
            .dispatch_all(&paths(&["a/b/main", "a/b/dev"]))
            .await;

        assert!(matches!(
            report.outcome(&BranchPath::new("a/b/main")),
            Some(DispatchOutcome::Failed { job, .. }) if job.as_str() == "job-main"
        ));
        assert_eq!(
            report.outcome(&BranchPath::new("a/b/dev")),
            Some(&DispatchOutcome::Triggered(JobId::new("job-dev")))
        );
        assert_eq!(report.failed(), 1);
        assert_eq!(report.triggered(), 1);
        // One attempt only.
        assert_eq!(dispatcher.trigger().triggered().len(), 2);
    }

    #[tokio::test]
    async fn job_missing_from_registry_is_not_triggered() {
        let trigger = RecordingTrigger::new().with_registry(&["job-main"]);
        let dispatcher = Dispatcher::new(trigger, job_map());
        let report = dispatcher
            .dispatch_all(&paths(&["a/b/main", "a/b/dev"]))
            .await;

        assert_eq!(
            report.outcome(&BranchPath::new("a/b/dev")),
            Some(&DispatchOutcome::UnknownJob(JobId::new("job-dev")))
        );
        assert_eq!(report.unknown(), 1);
        assert_eq!(dispatcher.trigger().triggered(), vec![JobId::new("job-main")]);
    }

    #[tokio::test]
    async fn registry_failure_skips_the_check() {
        let mut trigger = RecordingTrigger::new().with_registry(&[]);
        trigger.registry_fails = true;
        let dispatcher = Dispatcher::new(trigger, job_map());
        let report = dispatcher.dispatch_all(&paths(&["a/b/main"])).await;

        assert_eq!(report.triggered(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_empty_report() {
        let dispatcher = Dispatcher::new(RecordingTrigger::new(), job_map());
        let report = dispatcher.dispatch_all(&[]).await;
        assert_eq!(report, DispatchReport::default());
        assert!(dispatcher.trigger().triggered().is_empty());
    }

    #[tokio::test]
    async fn replaced_job_map_is_used() {
        let mut dispatcher = Dispatcher::new(RecordingTrigger::new(), JobMap::new());
        dispatcher.replace_job_map(job_map());
        let report = dispatcher.dispatch_all(&paths(&["a/b/main"])).await;
        assert_eq!(report.triggered(), 1);
        assert_eq!(dispatcher.job_map().len(), 3);
    }
}
