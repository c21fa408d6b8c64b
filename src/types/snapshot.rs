//! The aggregate snapshot served to pollers and mirrored in their state file.
//!
//! On the wire a snapshot is one flat JSON object: every key except the
//! reserved [`SUMMARY_KEY`] is a branch path mapped to a commit descriptor.
//!
//! ```text
//! {
//!   "#Jenkins Webhook": { "status": "2 commit messages available", "timestamp": "..." },
//!   "acme/widgets/main": { "commit_id": "abc123", "commit_msg": "fix", "commit_ts": "..." }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::ids::BranchPath;

/// Reserved snapshot key holding the [`StatusSummary`].
pub const SUMMARY_KEY: &str = "#Jenkins Webhook";

/// Minimal description of the head commit of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDescriptor {
    pub commit_id: String,
    pub commit_msg: String,
    /// Source-provided timestamp, kept verbatim.
    pub commit_ts: String,
}

impl CommitDescriptor {
    pub fn new(
        commit_id: impl Into<String>,
        commit_msg: impl Into<String>,
        commit_ts: impl Into<String>,
    ) -> Self {
        CommitDescriptor {
            commit_id: commit_id.into(),
            commit_msg: commit_msg.into(),
            commit_ts: commit_ts.into(),
        }
    }
}

/// Summary entry stored under [`SUMMARY_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status: String,
    pub timestamp: String,
}

impl StatusSummary {
    /// Summary written by an aggregate rebuild that admitted `count` records.
    pub fn rebuilt(count: usize, at: DateTime<Utc>) -> Self {
        StatusSummary {
            status: format!("{} commit messages available", count),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Latest commit per branch path, plus the status summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub branches: BTreeMap<BranchPath, CommitDescriptor>,
    pub summary: Option<StatusSummary>,
}

impl AggregateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, branch: &BranchPath) -> Option<&CommitDescriptor> {
        self.branches.get(branch)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl Serialize for AggregateSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.branches.len() + usize::from(self.summary.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(summary) = &self.summary {
            map.serialize_entry(SUMMARY_KEY, summary)?;
        }
        for (path, descriptor) in &self.branches {
            map.serialize_entry(path, descriptor)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AggregateSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SnapshotVisitor)
    }
}

struct SnapshotVisitor;

impl<'de> Visitor<'de> for SnapshotVisitor {
    type Value = AggregateSnapshot;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of branch paths to commit descriptors")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut snapshot = AggregateSnapshot::new();
        while let Some(key) = access.next_key::<String>()? {
            if key == SUMMARY_KEY {
                if snapshot.summary.is_some() {
                    return Err(de::Error::duplicate_field(SUMMARY_KEY));
                }
                snapshot.summary = Some(access.next_value()?);
            } else {
                let descriptor: CommitDescriptor = access.next_value()?;
                snapshot.branches.insert(BranchPath::new(key), descriptor);
            }
        }
        Ok(snapshot)
    }
}
