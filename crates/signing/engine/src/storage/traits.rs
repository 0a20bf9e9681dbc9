//! Storage trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signing_audit::{AuditError, AuditRecorder};
use signing_types::{
    AuditEvent, DocumentRef, PendingAuditEvent, RequestId, SignatureRequest, SigningError,
};
use std::sync::Arc;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request not found: {0}")]
    NotFound(RequestId),

    #[error("request already exists: {0}")]
    AlreadyExists(RequestId),

    /// The stored version moved past the one the caller read.
    #[error("version conflict on {request_id}: expected {expected}, found {actual}")]
    VersionConflict {
        request_id: RequestId,
        expected: u64,
        actual: u64,
    },

    #[error("audit append failed: {0}")]
    Audit(#[from] AuditError),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for SigningError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => SigningError::RequestNotFound(id),
            StorageError::Audit(e) => e.into(),
            // Version conflicts are retried by the manager; one leaking out
            // here is reported as a plain storage failure.
            other => SigningError::Storage(other.to_string()),
        }
    }
}

/// Durable home of signature requests.
///
/// `insert` and `commit` are atomic with respect to their audit events:
/// either the new request state and every event are recorded, or neither is.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Get a request by ID
    async fn get(&self, id: &RequestId) -> StorageResult<Option<SignatureRequest>>;

    /// Persist a brand-new request along with its opening events
    async fn insert(
        &self,
        request: SignatureRequest,
        events: Vec<PendingAuditEvent>,
    ) -> StorageResult<Vec<AuditEvent>>;

    /// Replace a request if its stored version still equals `expected_version`.
    ///
    /// The caller supplies the request already stamped with
    /// `expected_version + 1`.
    async fn commit(
        &self,
        expected_version: u64,
        request: SignatureRequest,
        events: Vec<PendingAuditEvent>,
    ) -> StorageResult<Vec<AuditEvent>>;

    /// All requests for a document, oldest first
    async fn list_for_document(
        &self,
        document_ref: &DocumentRef,
    ) -> StorageResult<Vec<SignatureRequest>>;

    /// Open requests whose expiry is at or before `now`, earliest first
    async fn list_overdue(&self, now: DateTime<Utc>) -> StorageResult<Vec<RequestId>>;

    /// The recorder this store appends audit events to
    fn audit_recorder(&self) -> Arc<dyn AuditRecorder>;
}
