//! Job Map: static mapping from branch path to build job.
//!
//! # Format
//!
//! ```text
//! # comment
//! acme/widgets/main    widgets-main
//! acme/widgets/dev     widgets-dev
//! ```
//!
//! One mapping per line, two whitespace-separated fields. Blank lines and
//! lines starting with `#` are ignored. A later line for the same branch path
//! overrides an earlier one.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::types::{BranchPath, JobId};

/// Errors loading a Job Map.
#[derive(Debug, Error)]
pub enum JobMapError {
    #[error("cannot read job map {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("job map line {line}: expected `<branch-path> <job>`, found {fields} field(s)")]
    InvalidLine { line: usize, fields: usize },
}

/// Read-only branch path → job mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobMap {
    entries: HashMap<BranchPath, JobId>,
}

impl JobMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and parses the Job Map at `path`.
    pub fn load(path: &Path) -> Result<Self, JobMapError> {
        let text = std::fs::read_to_string(path).map_err(|source| JobMapError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, JobMapError> {
        let mut entries = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            let [branch_path, job] = fields.as_slice() else {
                return Err(JobMapError::InvalidLine {
                    line: index + 1,
                    fields: fields.len(),
                });
            };

            if let Some(previous) = entries.insert(BranchPath::new(*branch_path), JobId::new(*job)) {
                debug!(
                    branch_path = %branch_path,
                    previous = %previous,
                    job = %job,
                    "Job map entry overridden by later line"
                );
            }
        }

        Ok(JobMap { entries })
    }

    pub fn get(&self, branch_path: &BranchPath) -> Option<&JobId> {
        self.entries.get(branch_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(BranchPath, JobId)> for JobMap {
    fn from_iter<I: IntoIterator<Item = (BranchPath, JobId)>>(iter: I) -> Self {
        JobMap {
            entries: iter.into_iter().collect(),
        }
    }
}
