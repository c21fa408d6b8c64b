//! Where the poller gets the current Aggregate Snapshot from.

use std::fmt;
use std::future::Future;

use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::trace;

use crate::types::AggregateSnapshot;

/// Supplies the current Aggregate Snapshot.
pub trait SnapshotSource {
    /// The error type returned by this source.
    type Error: fmt::Display + Send;

    /// Fetches the current snapshot. Any error aborts the cycle.
    fn fetch(&self) -> impl Future<Output = Result<AggregateSnapshot, Self::Error>> + Send;
}

/// Errors fetching the snapshot over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("status endpoint answered {0}")]
    Status(StatusCode),

    #[error("status endpoint returned an invalid snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Reads the snapshot from the receiver's status endpoint.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    http: Client,
    url: Url,
}

impl HttpSnapshotSource {
    pub fn new(http: Client, url: Url) -> Self {
        HttpSnapshotSource { http, url }
    }
}

impl SnapshotSource for HttpSnapshotSource {
    type Error = FetchError;

    async fn fetch(&self) -> Result<AggregateSnapshot, FetchError> {
        let response = self.http.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.bytes().await?;
        trace!(body = %String::from_utf8_lossy(&body), "Fetched status body");
        Ok(serde_json::from_slice(&body)?)
    }
}
