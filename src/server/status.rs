//! Status endpoint: the published Aggregate Snapshot.
//!
//! ```ignore
//! GET /status HTTP/1.1
//!
//! HTTP/1.1 200 OK
//! Content-Type: application/json
//!
//! {
//!   "#Jenkins Webhook": {"status": "1 commit messages available", "timestamp": "..."},
//!   "acme/widgets/main": {"commit_id": "abc123", "commit_msg": "fix", "commit_ts": "..."}
//! }
//! ```

use axum::Json;
use axum::extract::State;

use super::AppState;
use crate::types::AggregateSnapshot;

/// Serves the most recently published snapshot. Read-only.
pub async fn status_handler(State(app_state): State<AppState>) -> Json<AggregateSnapshot> {
    let snapshot = app_state.snapshots().current();
    Json(AggregateSnapshot::clone(&snapshot))
}
