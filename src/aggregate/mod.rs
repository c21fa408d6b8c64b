//! Aggregator: rebuilds the aggregate snapshot from every commit record.
//!
//! A rebuild never patches the previous snapshot. It rescans the full record
//! set, so the published snapshot always reflects exactly what is on disk,
//! including records edited by hand or missed by an earlier rebuild.
//!
//! # Failure Policy
//!
//! Records are re-derived with the same extractor used at ingestion. A record
//! that no longer resolves is logged and skipped; it never aborts the rebuild.
//! Only failing to list the records or to publish the result is an error.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ingest::extract::{Extraction, extract_bytes};
use crate::persistence::{CommitRecordStore, PersistError, SnapshotStore, StoredRecord};
use crate::types::{AggregateSnapshot, StatusSummary};

/// Errors that abort a rebuild.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("failed to scan commit records: {0}")]
    Scan(#[source] PersistError),

    #[error("failed to publish aggregate snapshot: {0}")]
    Publish(#[source] PersistError),
}

/// Counts from one rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Records found in the store.
    pub scanned: usize,
    /// Records that contributed a branch to the snapshot.
    pub admitted: usize,
    /// Records skipped because they no longer resolve.
    pub skipped: usize,
}

/// Rebuilds and publishes the aggregate snapshot.
pub struct Aggregator {
    records: Arc<dyn CommitRecordStore>,
    snapshots: Arc<dyn SnapshotStore>,
    /// Serializes rebuilds so the last publish comes from the last scan.
    rebuild_lock: Mutex<()>,
}

impl Aggregator {
    pub fn new(records: Arc<dyn CommitRecordStore>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Aggregator {
            records,
            snapshots,
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn snapshots(&self) -> &Arc<dyn SnapshotStore> {
        &self.snapshots
    }

    /// Rebuilds the snapshot, stamping it with the current time.
    pub fn rebuild(&self) -> Result<RebuildReport, AggregateError> {
        self.rebuild_at(Utc::now())
    }

    /// Rebuilds the snapshot, stamping it with `now`.
    pub fn rebuild_at(&self, now: DateTime<Utc>) -> Result<RebuildReport, AggregateError> {
        let _guard = self
            .rebuild_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let records = self.records.scan().map_err(AggregateError::Scan)?;
        let (snapshot, report) = build_snapshot(&records, now);
        self.snapshots
            .put_all(snapshot)
            .map_err(AggregateError::Publish)?;

        info!(
            scanned = report.scanned,
            admitted = report.admitted,
            skipped = report.skipped,
            "Rebuilt aggregate snapshot"
        );
        Ok(report)
    }
}

/// Builds a snapshot from a set of records.
///
/// Records are applied in the given order; if two records resolve to the same
/// branch path, the later one wins.
pub fn build_snapshot(
    records: &[StoredRecord],
    now: DateTime<Utc>,
) -> (AggregateSnapshot, RebuildReport) {
    let mut snapshot = AggregateSnapshot::new();
    let mut report = RebuildReport {
        scanned: records.len(),
        ..RebuildReport::default()
    };

    for record in records {
        match extract_bytes(&record.payload) {
            Extraction::Resolved(push) => {
                let branch_path = push.target.branch_path();
                if snapshot.branches.contains_key(&branch_path) {
                    warn!(
                        location = %record.location,
                        branch_path = %branch_path,
                        "Record resolves to an already-seen branch path; later record wins"
                    );
                }
                debug!(location = %record.location, branch_path = %branch_path, "Aggregated record");
                snapshot.branches.insert(branch_path, push.head_commit);
                report.admitted += 1;
            }
            Extraction::NotACommitEvent => {
                warn!(location = %record.location, "Skipping record without a head commit");
                report.skipped += 1;
            }
            Extraction::Malformed(reason) => {
                warn!(location = %record.location, reason = %reason, "Skipping malformed record");
                report.skipped += 1;
            }
        }
    }

    snapshot.summary = Some(StatusSummary::rebuilt(report.admitted, now));
    (snapshot, report)
}
