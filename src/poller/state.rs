//! Poller State: the last snapshot this poller acted on.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::persistence::{self, read_json_optional, write_json_atomic};
use crate::types::AggregateSnapshot;

/// File name of the Poller State inside the data directory.
pub const POLLER_STATE_FILE_NAME: &str = ".status_previous.json";

/// File-backed Poller State. Same format as the Aggregate Snapshot.
#[derive(Debug, Clone)]
pub struct PollerStateFile {
    path: PathBuf,
}

impl PollerStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PollerStateFile { path: path.into() }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(POLLER_STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the prior state. A missing or unreadable file is an empty
    /// state, so every branch in the next snapshot counts as changed.
    pub fn load(&self) -> AggregateSnapshot {
        match read_json_optional(&self.path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(path = %self.path.display(), "No prior poller state");
                AggregateSnapshot::default()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Prior poller state unreadable, treating as empty"
                );
                AggregateSnapshot::default()
            }
        }
    }

    /// Atomically replaces the state with `snapshot`.
    pub fn save(&self, snapshot: &AggregateSnapshot) -> persistence::Result<()> {
        write_json_atomic(&self.path, snapshot)
    }
}
