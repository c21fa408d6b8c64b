//! Shared test fixtures: push payloads and fake poller collaborators.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Value, json};

use crate::dispatch::BuildTrigger;
use crate::poller::SnapshotSource;
use crate::types::{AggregateSnapshot, BranchPath, CommitDescriptor, JobId};

/// A GitHub-style push payload with a generated message and fixed timestamp.
pub fn push_payload(owner: &str, repo: &str, git_ref: &str, commit_id: &str) -> Value {
    push_payload_with_commit(
        owner,
        repo,
        git_ref,
        commit_id,
        &format!("commit {}", commit_id),
        "2024-01-01T00:00:00Z",
    )
}

/// A GitHub-style push payload with an explicit head commit.
pub fn push_payload_with_commit(
    owner: &str,
    repo: &str,
    git_ref: &str,
    commit_id: &str,
    message: &str,
    timestamp: &str,
) -> Value {
    json!({
        "ref": git_ref,
        "before": "0000000000000000000000000000000000000000",
        "after": commit_id,
        "repository": {
            "name": repo,
            "full_name": format!("{}/{}", owner, repo),
            "owner": { "name": owner, "login": owner }
        },
        "pusher": { "name": owner },
        "head_commit": {
            "id": commit_id,
            "message": message,
            "timestamp": timestamp
        }
    })
}

/// In-flight temp files left directly under `dir`.
pub fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(crate::persistence::atomic::TEMP_SUFFIX))
        })
        .collect()
}

/// Builds a snapshot from `(branch path, commit id)` pairs.
pub fn snapshot_of(entries: &[(&str, &str)]) -> AggregateSnapshot {
    let mut snapshot = AggregateSnapshot::new();
    for (path, commit) in entries {
        snapshot.branches.insert(
            BranchPath::new(*path),
            CommitDescriptor::new(*commit, format!("commit {}", commit), "2024-01-01T00:00:00Z"),
        );
    }
    snapshot
}

/// Error type for the fakes below.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(pub String);

/// Snapshot source that replays a queue of canned results.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    results: Mutex<VecDeque<Result<AggregateSnapshot, String>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, snapshot: AggregateSnapshot) -> &Self {
        self.results.lock().unwrap().push_back(Ok(snapshot));
        self
    }

    pub fn push_err(&self, message: &str) -> &Self {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }
}

impl SnapshotSource for ScriptedSource {
    type Error = FakeError;

    async fn fetch(&self) -> Result<AggregateSnapshot, FakeError> {
        let next = self.results.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(message)) => Err(FakeError(message)),
            None => Err(FakeError("no scripted snapshot left".to_string())),
        }
    }
}

/// Build trigger that records every call.
#[derive(Debug, Default)]
pub struct RecordingTrigger {
    pub triggered: Mutex<Vec<JobId>>,
    /// Jobs whose trigger call fails.
    pub failing: HashSet<JobId>,
    /// When set, the registry returned by `known_jobs`.
    pub registry: Option<HashSet<JobId>>,
    /// When true, `known_jobs` itself fails.
    pub registry_fails: bool,
}

impl RecordingTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing(mut self, job: &str) -> Self {
        self.failing.insert(JobId::new(job));
        self
    }

    pub fn with_registry(mut self, jobs: &[&str]) -> Self {
        self.registry = Some(jobs.iter().map(|j| JobId::new(*j)).collect());
        self
    }

    pub fn triggered(&self) -> Vec<JobId> {
        self.triggered.lock().unwrap().clone()
    }
}

impl BuildTrigger for RecordingTrigger {
    type Error = FakeError;

    async fn known_jobs(&self) -> Result<Option<HashSet<JobId>>, FakeError> {
        if self.registry_fails {
            return Err(FakeError("registry unavailable".to_string()));
        }
        Ok(self.registry.clone())
    }

    async fn trigger(&self, job: &JobId) -> Result<(), FakeError> {
        self.triggered.lock().unwrap().push(job.clone());
        if self.failing.contains(job) {
            return Err(FakeError(format!("HTTP 500 for {}", job)));
        }
        Ok(())
    }
}
