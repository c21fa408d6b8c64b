//! Ingestion: authorize a push, persist its record, rebuild the aggregate.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::allow_list::OwnerAllowList;
use super::extract::{Extraction, MalformedReason, extract_bytes};
use crate::aggregate::{AggregateError, Aggregator};
use crate::persistence::{CommitRecordStore, PersistError};
use crate::types::BranchPath;

/// Why a payload was not admitted.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload is not a well-formed push.
    #[error("malformed payload: {0}")]
    Malformed(#[from] MalformedReason),

    /// The repository owner is not on the allow-list.
    #[error("repository owner not authorized")]
    NotAuthorized { owner: String },

    /// The record could not be written.
    #[error("failed to store commit record: {0}")]
    Store(#[from] PersistError),

    /// The record was written but the aggregate could not be rebuilt.
    #[error("{0}")]
    Aggregate(#[from] AggregateError),
}

/// Successful ingestion outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The record for this branch path was written and the aggregate rebuilt.
    Stored(BranchPath),
    /// A valid event that is not a push with a head commit; nothing persisted.
    Ignored,
}

/// Admits push payloads into the record store.
pub struct Ingestor {
    allow_list: OwnerAllowList,
    records: Arc<dyn CommitRecordStore>,
    aggregator: Arc<Aggregator>,
}

impl Ingestor {
    pub fn new(
        allow_list: OwnerAllowList,
        records: Arc<dyn CommitRecordStore>,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Ingestor {
            allow_list,
            records,
            aggregator,
        }
    }

    /// Ingests one raw payload.
    ///
    /// Checks run in order and the first failure is final: JSON shape, head
    /// commit presence, owner/repo/branch resolution, then the allow-list.
    /// The payload bytes are stored verbatim.
    pub fn ingest(&self, body: &[u8]) -> Result<IngestOutcome, IngestError> {
        let push = match extract_bytes(body) {
            Extraction::Resolved(push) => push,
            Extraction::NotACommitEvent => {
                debug!("Ignoring payload without a head commit");
                return Ok(IngestOutcome::Ignored);
            }
            Extraction::Malformed(reason) => {
                warn!(reason = %reason, "Rejecting malformed payload");
                return Err(reason.into());
            }
        };

        let owner = push.target.owner();
        if !self.allow_list.contains(owner) {
            warn!(owner = %owner, "Repository owner not authorized");
            return Err(IngestError::NotAuthorized {
                owner: owner.to_string(),
            });
        }

        let branch_path = push.target.branch_path();
        self.records.put(&push.target, body)?;
        info!(
            branch_path = %branch_path,
            commit_id = %push.head_commit.commit_id,
            "Stored commit record"
        );

        self.aggregator.rebuild()?;
        Ok(IngestOutcome::Stored(branch_path))
    }
}
