//! Error types for the signing workflow

use crate::{RequestId, RequestStatus, SignerStatus};

/// Errors that can occur in signing workflow operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// Malformed create input. Never persisted.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Signature request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("Signer {signer_email} not found on request {request_id}")]
    SignerNotFound {
        request_id: RequestId,
        signer_email: String,
    },

    #[error("Request {request_id} is already terminal ({status})")]
    RequestTerminal {
        request_id: RequestId,
        status: RequestStatus,
    },

    #[error("Request {0} has passed its expiry")]
    RequestOverdue(RequestId),

    #[error("Signer {signer_email} is not eligible to act: {reason}")]
    NotEligible { signer_email: String, reason: String },

    #[error("Invalid signer transition: {from} -> {to}")]
    InvalidSignerTransition { from: SignerStatus, to: SignerStatus },

    #[error("Invalid request transition: {from} -> {to}")]
    InvalidRequestTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// Optimistic-concurrency collision that survived the bounded retries.
    #[error("Request {request_id} was modified concurrently ({attempts} attempts)")]
    ConcurrentModification { request_id: RequestId, attempts: u32 },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The document could not be resolved for hashing at signing time.
    #[error("Document unavailable: {0}")]
    DocumentUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Audit error: {0}")]
    Audit(String),
}

impl SigningError {
    /// Conflict errors: actions against terminal requests, out-of-turn
    /// actions, and optimistic collisions.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SigningError::RequestTerminal { .. }
                | SigningError::RequestOverdue(_)
                | SigningError::NotEligible { .. }
                | SigningError::InvalidSignerTransition { .. }
                | SigningError::InvalidRequestTransition { .. }
                | SigningError::ConcurrentModification { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SigningError::RequestNotFound(_) | SigningError::SignerNotFound { .. }
        )
    }

    /// Only optimistic collisions are worth another read-compute-write cycle.
    /// Business-rule conflicts surface immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SigningError::ConcurrentModification { .. })
    }
}

/// Result type alias for signing operations
pub type SigningResult<T> = Result<T, SigningError>;
