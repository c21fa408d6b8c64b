//! Push payload extraction.
//!
//! Turns a parsed webhook payload into a tagged [`Extraction`]. The same rules
//! are used at ingestion (to admit a payload) and during aggregation (to
//! re-derive each stored record), so a record that was admitted always
//! aggregates to the same branch path.
//!
//! # Stages
//!
//! 1. **Classify**: a payload without a non-null `head_commit` is a valid but
//!    irrelevant event ([`Extraction::NotACommitEvent`]), e.g. a ping or a
//!    branch deletion.
//! 2. **Resolve**: owner and repo come from `repository.full_name`, falling
//!    back to `repository.owner.name` + `repository.name`. The branch is the
//!    last segment of `ref`, falling back to `repository.default_branch`.
//!    The head commit must carry string `id`, `message` and `timestamp`.
//!
//! Every lookup returns an `Option`; absence is reported as a
//! [`MalformedReason`], never as a panic.

use serde_json::Value;
use thiserror::Error;

use crate::types::{CommitDescriptor, InvalidPathComponent, RepoBranch};

/// Why a payload could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    /// The body is not JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    /// Neither `repository.full_name` nor `repository.owner.name`/`repository.name` resolved.
    #[error("repository owner and name not found")]
    MissingRepository,

    /// Neither `ref` nor `repository.default_branch` resolved.
    #[error("branch not found")]
    MissingBranch,

    /// A `head_commit` field is absent or not a string.
    #[error("head commit field {0} missing")]
    MissingCommitField(&'static str),

    /// Owner, repo or branch cannot be used as a path component.
    #[error("{0}")]
    InvalidPathComponent(#[from] InvalidPathComponent),
}

/// A push payload resolved to its branch and head commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPush {
    pub target: RepoBranch,
    pub head_commit: CommitDescriptor,
}

/// Outcome of extracting a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Resolved(ResolvedPush),
    NotACommitEvent,
    Malformed(MalformedReason),
}

/// Parses raw bytes and extracts them.
pub fn extract_bytes(bytes: &[u8]) -> Extraction {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(payload) => extract(&payload),
        Err(e) => Extraction::Malformed(MalformedReason::InvalidJson(e.to_string())),
    }
}

/// Extracts an already-parsed payload.
pub fn extract(payload: &Value) -> Extraction {
    let Some(head_commit) = payload.get("head_commit").filter(|v| !v.is_null()) else {
        return Extraction::NotACommitEvent;
    };

    match resolve(payload, head_commit) {
        Ok(resolved) => Extraction::Resolved(resolved),
        Err(reason) => Extraction::Malformed(reason),
    }
}

fn resolve(payload: &Value, head_commit: &Value) -> Result<ResolvedPush, MalformedReason> {
    let repository = payload.get("repository");

    let (owner, repo) = repository
        .and_then(full_name_parts)
        .or_else(|| repository.and_then(owner_and_name))
        .ok_or(MalformedReason::MissingRepository)?;

    let branch = ref_branch(payload)
        .or_else(|| repository.and_then(|r| str_field(r, "default_branch")))
        .ok_or(MalformedReason::MissingBranch)?;

    let target = RepoBranch::new(owner, repo, branch)?;
    let head_commit = commit_descriptor(head_commit)?;

    Ok(ResolvedPush {
        target,
        head_commit,
    })
}

/// Primary path: `repository.full_name` as exactly `owner/repo`.
fn full_name_parts(repository: &Value) -> Option<(&str, &str)> {
    let (owner, repo) = str_field(repository, "full_name")?.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner, repo))
}

/// Fallback path: `repository.owner.name` and `repository.name`.
fn owner_and_name(repository: &Value) -> Option<(&str, &str)> {
    let owner = str_field(repository.get("owner")?, "name")?;
    let repo = str_field(repository, "name")?;
    Some((owner, repo))
}

/// Last path segment of `ref`, e.g. `refs/heads/main` → `main`.
fn ref_branch(payload: &Value) -> Option<&str> {
    str_field(payload, "ref")?.rsplit('/').next()
}

fn commit_descriptor(head_commit: &Value) -> Result<CommitDescriptor, MalformedReason> {
    let field = |name: &'static str| {
        str_field(head_commit, name).ok_or(MalformedReason::MissingCommitField(name))
    };
    Ok(CommitDescriptor::new(
        field("id")?,
        field("message")?,
        field("timestamp")?,
    ))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str()
}
