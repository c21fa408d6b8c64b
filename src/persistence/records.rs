//! Commit Record Store: one verbatim push payload per branch.
//!
//! # File Layout
//!
//! ```text
//! <data_dir>/
//!   .status.json                 # aggregate snapshot (not a record)
//!   <owner>/<repo>/<branch>.json # latest payload for owner/repo/branch
//! ```
//!
//! Records are created or overwritten on every authorized push and never
//! deleted by this system. Each branch has its own file, so concurrent writers
//! to different branches cannot corrupt each other.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::Result;
use super::atomic::write_atomic;
use crate::types::RepoBranch;

/// Extension of record files. Anything else in the data directory is ignored.
const RECORD_EXTENSION: &str = "json";

/// A record as read back during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Where the record lives, relative to the store root (for logging).
    pub location: String,
    /// The payload bytes exactly as they were admitted.
    pub payload: Vec<u8>,
}

/// Durable storage for commit records.
pub trait CommitRecordStore: Send + Sync {
    /// Stores `payload` as the record for `target`, replacing any previous one.
    fn put(&self, target: &RepoBranch, payload: &[u8]) -> Result<()>;

    /// Returns every stored record, ordered by location.
    ///
    /// Records that vanish or cannot be read mid-scan are skipped; a record
    /// written during the scan may or may not be included.
    fn scan(&self) -> Result<Vec<StoredRecord>>;
}

/// Commit records kept as one JSON file per branch under a root directory.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsRecordStore { root: root.into() }
    }

    /// Path of the record file for `target`.
    pub fn record_path(&self, target: &RepoBranch) -> PathBuf {
        self.root
            .join(target.owner())
            .join(target.repo())
            .join(format!("{}.{}", target.branch(), RECORD_EXTENSION))
    }
}

impl CommitRecordStore for FsRecordStore {
    fn put(&self, target: &RepoBranch, payload: &[u8]) -> Result<()> {
        let path = self.record_path(target);
        write_atomic(&path, payload)?;
        debug!(path = %path.display(), "Stored commit record");
        Ok(())
    }

    fn scan(&self) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();

        let owners = match list_visible(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        for owner_dir in owners.into_iter().filter(|p| p.is_dir()) {
            for repo_dir in list_visible_or_skip(&owner_dir)
                .into_iter()
                .filter(|p| p.is_dir())
            {
                for file in list_visible_or_skip(&repo_dir) {
                    if !is_record_file(&file) {
                        continue;
                    }
                    let location = file
                        .strip_prefix(&self.root)
                        .unwrap_or(&file)
                        .display()
                        .to_string();
                    match std::fs::read(&file) {
                        Ok(payload) => records.push(StoredRecord { location, payload }),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            debug!(location = %location, "Record removed during scan");
                        }
                        Err(e) => {
                            warn!(location = %location, error = %e, "Skipping unreadable record");
                        }
                    }
                }
            }
        }

        records.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(records)
    }
}

/// Lists directory entries whose names do not start with a dot.
fn list_visible(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden {
            paths.push(entry.path());
        }
    }
    Ok(paths)
}

/// Like [`list_visible`] for nested directories: failures skip the directory.
fn list_visible_or_skip(dir: &Path) -> Vec<PathBuf> {
    match list_visible(dir) {
        Ok(paths) => paths,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Skipping unreadable record directory");
            Vec::new()
        }
    }
}

fn is_record_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == RECORD_EXTENSION)
}

/// In-memory record store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record at an arbitrary location, bypassing validation.
    ///
    /// Stands in for records edited by hand or written by older versions.
    pub fn insert_raw(&self, location: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.into(), payload.into());
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommitRecordStore for MemoryRecordStore {
    fn put(&self, target: &RepoBranch, payload: &[u8]) -> Result<()> {
        let location = format!(
            "{}/{}/{}.{}",
            target.owner(),
            target.repo(),
            target.branch(),
            RECORD_EXTENSION
        );
        self.insert_raw(location, payload);
        Ok(())
    }

    fn scan(&self) -> Result<Vec<StoredRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .map(|(location, payload)| StoredRecord {
                location: location.clone(),
                payload: payload.clone(),
            })
            .collect())
    }
}
