//! Push Relay - records repository pushes and triggers builds for changed branches.
//!
//! Two processes share this library:
//!
//! - the **receiver** ([`server`]) admits push webhooks from allow-listed
//!   owners, stores one record per branch, and publishes an aggregate of the
//!   latest commit on every branch;
//! - the **poller** ([`poller`]) periodically fetches that aggregate, diffs it
//!   against what it saw last, and asks the build system to run the job mapped
//!   to each changed branch ([`dispatch`]).

pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod ingest;
pub mod persistence;
pub mod poller;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
