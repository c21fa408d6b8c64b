//! Persistence layer: commit records and the aggregate snapshot.
//!
//! # File Layout
//!
//! ```text
//! <data_dir>/
//!   .status.json                 # aggregate snapshot (receiver)
//!   .status_previous.json        # poller state (poller's own data dir)
//!   <owner>/<repo>/<branch>.json # commit records
//! ```
//!
//! # Crash Safety
//!
//! All files are replaced with write-to-temp-then-rename plus file and
//! directory fsync (see [`atomic`]). A crash mid-write leaves the previous
//! version in place and at worst a stray `*.tmp` file, which scans ignore.

use std::io;

use thiserror::Error;

pub mod atomic;
pub mod records;
pub mod snapshot;

pub use atomic::{read_json_optional, write_atomic, write_json_atomic};
pub use records::{CommitRecordStore, FsRecordStore, MemoryRecordStore, StoredRecord};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SNAPSHOT_FILE_NAME, SnapshotStore};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;
