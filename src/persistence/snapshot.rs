//! Aggregate snapshot storage.
//!
//! The [`SnapshotStore`] owns the published snapshot. Callers never touch the
//! snapshot file directly: the aggregator replaces the whole snapshot through
//! [`SnapshotStore::put_all`], and the status endpoint reads through
//! [`SnapshotStore::current`].
//!
//! # Atomic Publication
//!
//! [`FileSnapshotStore`] writes `.status.json` with write-to-temp-then-rename,
//! then swaps an in-memory `Arc` under a lock. Concurrent readers see either
//! the old or the new snapshot, never a partial one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::Result;
use super::atomic::{read_json_optional, write_json_atomic};
use crate::types::{AggregateSnapshot, BranchPath, CommitDescriptor};

/// File name of the aggregate snapshot inside the data directory.
pub const SNAPSHOT_FILE_NAME: &str = ".status.json";

/// Owner of the published aggregate snapshot.
pub trait SnapshotStore: Send + Sync {
    /// Returns the descriptor currently published for `branch`.
    fn get(&self, branch: &BranchPath) -> Option<CommitDescriptor>;

    /// Returns the whole published snapshot.
    fn current(&self) -> Arc<AggregateSnapshot>;

    /// Replaces the published snapshot wholesale.
    fn put_all(&self, snapshot: AggregateSnapshot) -> Result<()>;
}

/// Snapshot store that publishes from memory only.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    current: RwLock<Arc<AggregateSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get(&self, branch: &BranchPath) -> Option<CommitDescriptor> {
        self.current().get(branch).cloned()
    }

    fn current(&self) -> Arc<AggregateSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn put_all(&self, snapshot: AggregateSnapshot) -> Result<()> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        Ok(())
    }
}

/// Snapshot store backed by a JSON file, with an in-memory published copy.
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    current: RwLock<Arc<AggregateSnapshot>>,
}

impl FileSnapshotStore {
    /// Opens the store at `<data_dir>/.status.json`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::open(data_dir.join(SNAPSHOT_FILE_NAME))
    }

    /// Opens the store, publishing whatever snapshot is already on disk.
    ///
    /// A missing or unreadable file starts the store empty; the next rebuild
    /// replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = match read_json_optional::<AggregateSnapshot>(&path) {
            Ok(Some(snapshot)) => {
                debug!(path = %path.display(), branches = snapshot.len(), "Loaded aggregate snapshot");
                snapshot
            }
            Ok(None) => AggregateSnapshot::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable aggregate snapshot");
                AggregateSnapshot::new()
            }
        };
        FileSnapshotStore {
            path,
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get(&self, branch: &BranchPath) -> Option<CommitDescriptor> {
        self.current().get(branch).cloned()
    }

    fn current(&self) -> Arc<AggregateSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn put_all(&self, snapshot: AggregateSnapshot) -> Result<()> {
        // Disk first: if the write fails, the published copy stays in step
        // with what a restart would load.
        write_json_atomic(&self.path, &snapshot)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::leftover_temp_files;
    use crate::types::StatusSummary;
    use tempfile::tempdir;

    fn snapshot_with(branch: &str, commit: &str) -> AggregateSnapshot {
        let mut snapshot = AggregateSnapshot::new();
        snapshot.branches.insert(
            BranchPath::new(branch),
            CommitDescriptor::new(commit, "msg", "2024-01-01T00:00:00Z"),
        );
        snapshot.summary = Some(StatusSummary {
            status: "1 commit messages available".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        });
        snapshot
    }

    #[test]
    fn memory_store_put_all_replaces_wholesale() {
        let store = MemorySnapshotStore::new();
        store.put_all(snapshot_with("a/b/main", "1")).unwrap();
        store.put_all(snapshot_with("a/b/dev", "2")).unwrap();

        assert!(store.get(&BranchPath::new("a/b/main")).is_none());
        assert_eq!(
            store.get(&BranchPath::new("a/b/dev")).unwrap().commit_id,
            "2"
        );
    }

    #[test]
    fn file_store_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::in_data_dir(dir.path());
        let snapshot = snapshot_with("a/b/main", "1");

        store.put_all(snapshot.clone()).unwrap();

        assert!(store.path().exists());
        assert!(leftover_temp_files(dir.path()).is_empty());

        let reopened = FileSnapshotStore::in_data_dir(dir.path());
        assert_eq!(*reopened.current(), snapshot);
    }

    #[test]
    fn file_store_starts_empty_without_file() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::in_data_dir(dir.path());
        assert!(store.current().is_empty());
        assert!(store.current().summary.is_none());
    }

    #[test]
    fn file_store_starts_empty_on_corrupt_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE_NAME), "{ truncated").unwrap();

        let store = FileSnapshotStore::in_data_dir(dir.path());
        assert!(store.current().is_empty());
    }

    #[test]
    fn readers_keep_their_snapshot_across_put_all() {
        let store = MemorySnapshotStore::new();
        store.put_all(snapshot_with("a/b/main", "1")).unwrap();

        let held = store.current();
        store.put_all(snapshot_with("a/b/main", "2")).unwrap();

        assert_eq!(held.get(&BranchPath::new("a/b/main")).unwrap().commit_id, "1");
        assert_eq!(
            store.current().get(&BranchPath::new("a/b/main")).unwrap().commit_id,
            "2"
        );
    }

    #[test]
    fn failed_write_keeps_published_snapshot() {
        let dir = tempdir().unwrap();
        // Parent "directory" is a regular file, so the write must fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = FileSnapshotStore::open(blocker.join(SNAPSHOT_FILE_NAME));

        assert!(store.put_all(snapshot_with("a/b/main", "1")).is_err());
        assert!(store.current().is_empty());
    }
}
