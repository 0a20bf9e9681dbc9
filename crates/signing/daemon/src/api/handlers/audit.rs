//! Audit trail handlers

use super::parse_request_id;
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use signing_audit::ChainVerification;
use signing_types::AuditEvent;

/// Audit events in the order they were applied
pub async fn get_audit_trail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AuditEvent>>> {
    let request_id = parse_request_id(&id)?;
    Ok(Json(state.manager.get_audit_trail(&request_id).await?))
}

/// Recompute the request's audit hash chain
pub async fn verify_audit_trail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChainVerification>> {
    let request_id = parse_request_id(&id)?;
    Ok(Json(state.manager.verify_audit_trail(&request_id).await?))
}
