//! Document upload handlers

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use signing_engine::document_digest;
use signing_types::DocumentRef;

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadDocumentResponse {
    pub document_ref: DocumentRef,
    pub size: usize,
    pub digest: String,
}

/// Store (or replace) a document's content
pub async fn upload_document(
    State(state): State<AppState>,
    Path(document_ref): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadDocumentResponse>)> {
    let document_ref = DocumentRef::new(document_ref);
    if document_ref.is_blank() {
        return Err(ApiError::BadRequest("document reference must not be blank".into()));
    }

    let digest = document_digest(&body);
    let size = body.len();
    state.documents.put(document_ref.clone(), body.to_vec());

    tracing::info!(document_ref = %document_ref, size, "Document stored");

    Ok((
        StatusCode::CREATED,
        Json(UploadDocumentResponse {
            document_ref,
            size,
            digest,
        }),
    ))
}
