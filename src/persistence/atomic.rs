//! Write-to-temp-then-rename file replacement.
//!
//! Every file this system owns (commit records, the aggregate snapshot, the
//! poller state) is replaced through [`write_atomic`]:
//! 1. Write to a uniquely named `.<name>.<random>.tmp` in the same directory
//! 2. fsync the temp file
//! 3. Rename over `<name>`
//! 4. fsync the directory so the rename survives power loss
//!
//! Readers therefore see either the previous contents or the new contents,
//! never a truncated file. Each writer has its own temp file, so concurrent
//! writers to the same path never share an inode; the last rename wins.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{PersistError, Result};

/// Suffix of in-flight temp files. Record scans only pick up `*.json`.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Atomically replaces `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    // On failure the temp file is removed when the returned handle drops.
    tmp.persist(path).map_err(|e| PersistError::Io(e.error))?;

    fsync_dir(parent)?;
    Ok(())
}

/// Serializes `value` as pretty JSON and writes it with [`write_atomic`].
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Reads a JSON file, returning `None` if it does not exist.
///
/// Malformed JSON is an error; callers decide whether that is fatal.
pub fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistError::Io(e)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Syncs a directory so that entries created or renamed in it are durable.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    File::open(dir_path)?.sync_all()
}
