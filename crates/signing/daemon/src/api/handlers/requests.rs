//! Signature request handlers

use super::parse_request_id;
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use signing_engine::CreateSignatureRequest;
use signing_types::{DocumentRef, Signature, SignatureRequest, SignerRequirement};

/// Create a signature request
pub async fn create_request(
    State(state): State<AppState>,
    Json(request): Json<CreateSignatureRequest>,
) -> ApiResult<(StatusCode, Json<SignatureRequest>)> {
    let created = state.manager.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get a request with its requirements and signatures
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SignatureRequest>> {
    let request_id = parse_request_id(&id)?;
    Ok(Json(state.manager.get_status(&request_id).await?))
}

/// All requests created for a document
pub async fn list_requests_for_document(
    State(state): State<AppState>,
    Path(document_ref): Path<String>,
) -> ApiResult<Json<Vec<SignatureRequest>>> {
    let requests = state
        .manager
        .get_requests_for_document(&DocumentRef::new(document_ref))
        .await?;
    Ok(Json(requests))
}

/// Cancel request body
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub actor_id: String,
}

/// Cancel an open request
pub async fn cancel_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> ApiResult<Json<SignatureRequest>> {
    let request_id = parse_request_id(&id)?;
    let cancelled = state.manager.cancel(&request_id, &body.actor_id).await?;
    Ok(Json(cancelled))
}

/// Remind a signer who has not acted yet
pub async fn send_reminder(
    State(state): State<AppState>,
    Path((id, email)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let request_id = parse_request_id(&id)?;
    state.manager.send_reminder(&request_id, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Signers who may act right now
pub async fn eligible_signers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SignerRequirement>>> {
    let request_id = parse_request_id(&id)?;
    Ok(Json(state.manager.eligible_signers(&request_id).await?))
}

/// Signatures collected so far
pub async fn get_signatures(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Signature>>> {
    let request_id = parse_request_id(&id)?;
    Ok(Json(state.manager.get_signatures(&request_id).await?))
}

