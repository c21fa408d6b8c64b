//! Push webhook handler.
//!
//! Ingestion touches the filesystem, so it runs on the blocking pool. The
//! response reports only the outcome class: rejected payloads never learn
//! which check failed.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, trace};

use super::AppState;
use crate::ingest::{IngestError, IngestOutcome};

/// Body returned for malformed and unauthorized payloads.
pub const REJECTED_BODY: &str = "invalid request format or repository owner not authorized";

/// Body returned for valid events that are not pushes with a head commit.
pub const IGNORED_BODY: &str = "message ignored: not a commit event";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The ingestion task panicked or was cancelled.
    #[error("ingestion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match &self {
            WebhookError::Ingest(IngestError::Malformed(_) | IngestError::NotAuthorized { .. }) => {
                (StatusCode::FORBIDDEN, REJECTED_BODY).into_response()
            }
            WebhookError::Ingest(IngestError::Store(_) | IngestError::Aggregate(_))
            | WebhookError::Task(_) => {
                error!(error = %self, "Failed to ingest push");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 200 `["OK"]`: record stored and aggregate rebuilt
/// - 200 plain text: recognized event without a head commit, discarded
/// - 403: malformed payload or owner not on the allow-list
/// - 500: record or aggregate could not be written
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<Response, WebhookError> {
    trace!(body = %String::from_utf8_lossy(&body), "Received push payload");

    let ingestor = app_state.ingestor().clone();
    let outcome = tokio::task::spawn_blocking(move || ingestor.ingest(&body)).await??;

    let response = match outcome {
        IngestOutcome::Stored(_) => (StatusCode::OK, Json(["OK"])).into_response(),
        IngestOutcome::Ignored => (StatusCode::OK, IGNORED_BODY).into_response(),
    };
    Ok(response)
}
