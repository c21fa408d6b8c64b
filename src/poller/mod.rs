//! Poller/differ.
//!
//! ```text
//!   status endpoint ──fetch──▶ current snapshot
//!                                   │ compare with Poller State
//!                                   ▼
//!                           changed branch paths ──▶ Dispatcher ──▶ build system
//!                                   │
//!                                   ▼ after every dispatch attempt
//!                          Poller State := current snapshot
//! ```

pub mod config;
mod cycle;
pub mod diff;
pub mod source;
pub mod state;

#[cfg(test)]
mod tests;

pub use config::PollConfig;
pub use cycle::{CycleError, CycleOutcome, CycleReport, Poller};
pub use diff::{BranchChange, ChangeKind, changed_branches};
pub use source::{FetchError, HttpSnapshotSource, SnapshotSource};
pub use state::{POLLER_STATE_FILE_NAME, PollerStateFile};
