//! Application state for API handlers

use signing_engine::{ExpirationScheduler, InMemoryDocumentStore, SignatureRequestManager};
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The signing engine
    pub manager: Arc<SignatureRequestManager>,

    /// Expiration scheduler handle, for on-demand sweeps
    pub scheduler: Arc<ExpirationScheduler>,

    /// Document content the engine hashes at signing time
    pub documents: Arc<InMemoryDocumentStore>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Graceful shutdown signal sender
    pub shutdown_tx: watch::Sender<bool>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        manager: Arc<SignatureRequestManager>,
        scheduler: Arc<ExpirationScheduler>,
        documents: Arc<InMemoryDocumentStore>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            manager,
            scheduler,
            documents,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
            shutdown_tx,
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
