//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use signing_engine::{
    AuthenticatorRegistry, DigestCertificateGenerator, ExpirationScheduler,
    InMemoryDocumentStore, InMemoryRequestStore, InMemoryVerificationChannel, LoggingNotifier,
    SharedSecretChannel, SignatureRequestManager, VerificationChannel,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Signing daemon server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let store = Arc::new(InMemoryRequestStore::new());
        let documents = Arc::new(InMemoryDocumentStore::new());

        let channel: Arc<dyn VerificationChannel> = match config.auth.shared_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                tracing::warn!("Signer verification uses a shared development code");
                Arc::new(SharedSecretChannel::new(code.trim()))
            }
            Some(_) => {
                return Err(DaemonError::Config("auth.shared_code must not be blank".into()));
            }
            None => {
                tracing::warn!("No verification channel configured; every signing proof will be rejected");
                Arc::new(InMemoryVerificationChannel::new())
            }
        };
        let authenticators =
            AuthenticatorRegistry::with_channel(channel, config.engine.auth_timeout());

        let manager = Arc::new(
            SignatureRequestManager::builder(store, documents.clone())
                .with_config(config.engine.clone())
                .with_authenticators(authenticators)
                .with_notifier(Arc::new(LoggingNotifier))
                .with_certificate_generator(Arc::new(DigestCertificateGenerator))
                .build(),
        );
        let scheduler = Arc::new(ExpirationScheduler::new(manager.clone()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::new(manager, scheduler, documents, shutdown_tx);

        Ok(Self {
            config,
            state,
            shutdown_rx,
        })
    }

    /// Application state, for embedding the API elsewhere
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state.clone(), &self.config.server);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Signing daemon listening on {}", addr);

        // Start expiration scheduler in background
        let scheduler = self.state.scheduler.clone();
        let scheduler_handle = tokio::spawn(scheduler.run(self.shutdown_rx.clone()));

        // Run server with graceful shutdown
        let shutdown_tx = self.state.shutdown_tx.clone();
        let mut api_shutdown = self.shutdown_rx.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = async {
                        while api_shutdown.changed().await.is_ok() {
                            if *api_shutdown.borrow() {
                                break;
                            }
                        }
                    } => {}
                }
            })
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Signing daemon shutting down");

        // Stop scheduler between requests
        let _ = shutdown_tx.send(true);
        if let Err(e) = scheduler_handle.await {
            tracing::error!(error = %e, "Expiration scheduler task failed");
        }

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
