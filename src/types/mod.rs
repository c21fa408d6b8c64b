//! Core domain types shared by the receiver and the poller.

pub mod ids;
pub mod snapshot;

pub use ids::{BranchPath, InvalidPathComponent, JobId, RepoBranch, validate_path_component};
pub use snapshot::{AggregateSnapshot, CommitDescriptor, SUMMARY_KEY, StatusSummary};
