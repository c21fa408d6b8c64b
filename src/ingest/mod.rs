//! Ingestion Authorizer: admits push payloads into the commit record store.
//!
//! # Flow
//!
//! ```text
//! raw body ─► extract ─► allow-list ─► record store ─► aggregator rebuild
//!               │            │
//!               │            └─► NotAuthorized (403)
//!               ├─► NotACommitEvent (200, nothing persisted)
//!               └─► Malformed (403)
//! ```

pub mod allow_list;
pub mod extract;
mod ingestor;

pub use allow_list::OwnerAllowList;
pub use extract::{Extraction, MalformedReason, ResolvedPush, extract, extract_bytes};
pub use ingestor::{IngestError, IngestOutcome, Ingestor};
