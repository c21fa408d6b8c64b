//! HTTP receiver.
//!
//! # Endpoints
//!
//! - `POST <webhook path>` - Admits a push payload (default `/github`)
//! - `GET <status path>` - Returns the Aggregate Snapshot as JSON (default `/status`)
//! - `GET /health` - Returns 200 if the server is running
//!
//! Configured routes answer with or without a trailing slash. Any other path,
//! or a configured path with the wrong method, gets 400.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aggregate::{AggregateError, Aggregator};
use crate::config::{HEALTH_PATH, ServerConfig};
use crate::ingest::Ingestor;
use crate::persistence::{CommitRecordStore, FileSnapshotStore, FsRecordStore, SnapshotStore};

pub mod health;
pub mod status;
pub mod webhook;


pub use health::health_handler;
pub use status::status_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Body returned for unknown paths and wrong methods.
pub const INVALID_REQUEST_BODY: &str = "invalid path or method";

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    ingestor: Arc<Ingestor>,
    snapshots: Arc<dyn SnapshotStore>,
    status_path: String,
    webhook_path: String,
}

impl AppState {
    /// Creates a new `AppState`. Routes must already be normalized (leading
    /// slash, no trailing slash).
    pub fn new(
        ingestor: Arc<Ingestor>,
        snapshots: Arc<dyn SnapshotStore>,
        status_path: impl Into<String>,
        webhook_path: impl Into<String>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                ingestor,
                snapshots,
                status_path: status_path.into(),
                webhook_path: webhook_path.into(),
            }),
        }
    }

    pub fn ingestor(&self) -> &Arc<Ingestor> {
        &self.inner.ingestor
    }

    pub fn snapshots(&self) -> &Arc<dyn SnapshotStore> {
        &self.inner.snapshots
    }

    pub fn status_path(&self) -> &str {
        &self.inner.status_path
    }

    pub fn webhook_path(&self) -> &str {
        &self.inner.webhook_path
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> Router {
    let status = app_state.status_path().to_string();
    let webhook = app_state.webhook_path().to_string();

    Router::new()
        .route(&status, get(status_handler).fallback(invalid_request))
        .route(
            &format!("{}/", status),
            get(status_handler).fallback(invalid_request),
        )
        .route(&webhook, post(webhook_handler).fallback(invalid_request))
        .route(
            &format!("{}/", webhook),
            post(webhook_handler).fallback(invalid_request),
        )
        .route(HEALTH_PATH, get(health_handler))
        .fallback(invalid_request)
        .with_state(app_state)
}

async fn invalid_request() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, INVALID_REQUEST_BODY)
}

/// Errors starting the receiver.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("cannot create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("initial aggregate rebuild failed: {0}")]
    Rebuild(#[from] AggregateError),

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Runs the receiver until `shutdown` is cancelled.
///
/// The aggregate is rebuilt from the record store before the listener
/// opens, so the published snapshot always reflects the records on disk.
pub async fn serve(config: &ServerConfig, shutdown: CancellationToken) -> Result<(), ServeError> {
    std::fs::create_dir_all(&config.data_dir).map_err(|source| ServeError::DataDir {
        path: config.data_dir.clone(),
        source,
    })?;

    let records: Arc<dyn CommitRecordStore> = Arc::new(FsRecordStore::new(config.data_dir.clone()));
    let snapshots: Arc<dyn SnapshotStore> =
        Arc::new(FileSnapshotStore::in_data_dir(&config.data_dir));
    let aggregator = Arc::new(Aggregator::new(records.clone(), snapshots.clone()));

    let report = aggregator.rebuild()?;
    info!(
        data_dir = %config.data_dir.display(),
        scanned = report.scanned,
        admitted = report.admitted,
        skipped = report.skipped,
        "Aggregate rebuilt at startup"
    );

    let ingestor = Arc::new(Ingestor::new(config.owners.clone(), records, aggregator));
    let app_state = AppState::new(
        ingestor,
        snapshots,
        config.status_path.clone(),
        config.webhook_path.clone(),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(
        addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or(addr),
        status_path = %config.status_path,
        webhook_path = %config.webhook_path,
        owners = %config.owners,
        "Receiver listening"
    );

    axum::serve(listener, build_router(app_state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ServeError::Serve)?;

    info!("Receiver stopped");
    Ok(())
}
