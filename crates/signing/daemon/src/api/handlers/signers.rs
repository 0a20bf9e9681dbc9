//! Signer action handlers

use super::parse_request_id;
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use signing_engine::AuthProof;
use signing_types::{Signature, SignatureRequest, SignerContext};

/// Client context a signer may send explicitly; falls back to headers
#[derive(Debug, Default, Deserialize)]
pub struct ClientContext {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Build the signer context from the body, then `X-Forwarded-For` and
/// `User-Agent`.
fn signer_context(headers: &HeaderMap, client: ClientContext) -> SignerContext {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    SignerContext {
        ip_address: client.ip_address.or_else(|| {
            header_value("x-forwarded-for")
                .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        }),
        user_agent: client
            .user_agent
            .or_else(|| header_value(header::USER_AGENT.as_str())),
    }
}

/// Record that a signer opened the document
pub async fn view_document(
    State(state): State<AppState>,
    Path((id, email)): Path<(String, String)>,
    headers: HeaderMap,
    body: Option<Json<ClientContext>>,
) -> ApiResult<Json<SignatureRequest>> {
    let request_id = parse_request_id(&id)?;
    let client = body.map(|Json(c)| c).unwrap_or_default();
    let request = state
        .manager
        .view_document(&request_id, &email, signer_context(&headers, client))
        .await?;
    Ok(Json(request))
}

/// Sign request body
#[derive(Debug, Deserialize)]
pub struct SignDocumentRequest {
    pub signature_data: String,
    pub auth_proof: AuthProof,
    #[serde(flatten)]
    pub client: ClientContext,
}

/// Sign the document
pub async fn sign_document(
    State(state): State<AppState>,
    Path((id, email)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<SignDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Signature>)> {
    let request_id = parse_request_id(&id)?;
    let signature = state
        .manager
        .sign_document(
            &request_id,
            &email,
            &body.signature_data,
            &body.auth_proof,
            signer_context(&headers, body.client),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(signature)))
}

/// Decline request body
#[derive(Debug, Deserialize)]
pub struct DeclineRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub client: ClientContext,
}

/// Decline to sign
pub async fn decline_signature(
    State(state): State<AppState>,
    Path((id, email)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<DeclineRequest>,
) -> ApiResult<Json<SignatureRequest>> {
    let request_id = parse_request_id(&id)?;
    let request = state
        .manager
        .decline_signature(
            &request_id,
            &email,
            body.reason,
            signer_context(&headers, body.client),
        )
        .await?;
    Ok(Json(request))
}
