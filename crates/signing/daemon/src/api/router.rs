//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Documents
        .route("/documents/:document_ref", put(handlers::upload_document))
        .route(
            "/documents/:document_ref/requests",
            get(handlers::list_requests_for_document),
        )
        // Requests
        .route("/requests", post(handlers::create_request))
        .route("/requests/:id", get(handlers::get_request))
        .route("/requests/:id/cancel", post(handlers::cancel_request))
        .route("/requests/:id/eligible", get(handlers::eligible_signers))
        .route("/requests/:id/signatures", get(handlers::get_signatures))
        // Signer actions
        .route("/requests/:id/signers/:email/view", post(handlers::view_document))
        .route("/requests/:id/signers/:email/sign", post(handlers::sign_document))
        .route(
            "/requests/:id/signers/:email/decline",
            post(handlers::decline_signature),
        )
        .route("/requests/:id/signers/:email/remind", post(handlers::send_reminder))
        // Audit
        .route("/requests/:id/audit", get(handlers::get_audit_trail))
        .route("/requests/:id/audit/verify", get(handlers::verify_audit_trail))
        // Events and expiration
        .route("/events/stream", get(handlers::stream_events))
        .route("/expiration/sweep", post(handlers::run_sweep));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(TraceLayer::new_for_http());

    let router = if server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
