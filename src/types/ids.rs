//! Newtype wrappers for the identities that flow between receiver and poller.
//!
//! These types prevent accidental mixing of branch paths and job identifiers
//! (both are plain strings on the wire) and make the code more self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The composite `owner/repo/branch` identity used as a snapshot and Job Map key.
///
/// Case-sensitive. Values built through [`RepoBranch::branch_path`] are
/// guaranteed to contain exactly two separators; values read back from the
/// wire or from configuration are taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchPath(pub String);

impl BranchPath {
    pub fn new(s: impl Into<String>) -> Self {
        BranchPath(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BranchPath {
    fn from(s: String) -> Self {
        BranchPath(s)
    }
}

impl From<&str> for BranchPath {
    fn from(s: &str) -> Self {
        BranchPath(s.to_string())
    }
}

/// An external build-job identifier, as named in the Job Map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(s: impl Into<String>) -> Self {
        JobId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A path component that cannot be used as part of the on-disk record layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {value:?}")]
pub struct InvalidPathComponent {
    pub field: &'static str,
    pub value: String,
}

/// Checks that `value` is safe to use as one directory or file name component.
///
/// Rejects empty values, anything starting with a dot (covers `.`, `..` and the
/// hidden files the store keeps next to the records), path separators and NUL.
pub fn validate_path_component(
    field: &'static str,
    value: &str,
) -> Result<(), InvalidPathComponent> {
    let unsafe_component = value.is_empty()
        || value.starts_with('.')
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0');

    if unsafe_component {
        return Err(InvalidPathComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A validated owner/repo/branch triple.
///
/// This is the only way to build a [`BranchPath`] that the record store will
/// accept, so every stored record maps to exactly one branch path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoBranch {
    owner: String,
    repo: String,
    branch: String,
}

impl RepoBranch {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Result<Self, InvalidPathComponent> {
        let (owner, repo, branch) = (owner.into(), repo.into(), branch.into());
        validate_path_component("owner", &owner)?;
        validate_path_component("repo", &repo)?;
        validate_path_component("branch", &branch)?;
        Ok(RepoBranch {
            owner,
            repo,
            branch,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn branch_path(&self) -> BranchPath {
        BranchPath(format!("{}/{}/{}", self.owner, self.repo, self.branch))
    }
}

impl fmt::Display for RepoBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repo, self.branch)
    }
}
