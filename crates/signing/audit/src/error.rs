//! Error types for the audit trail

use signing_types::{RequestId, SigningError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit batch mixes requests: expected {expected}, found {found}")]
    MixedBatch {
        expected: RequestId,
        found: RequestId,
    },

    #[error("Audit storage error: {0}")]
    Storage(String),
}

impl From<AuditError> for SigningError {
    fn from(err: AuditError) -> Self {
        SigningError::Audit(err.to_string())
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
