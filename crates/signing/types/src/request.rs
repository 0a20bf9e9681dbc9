//! Signature requests: the unit of work and of concurrency control

use crate::{
    DocumentRef, RequestId, Signature, SignerRequirement, SigningError, SigningResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Enumerations ─────────────────────────────────────────────────────

/// Evidentiary strength of the signature. Does not change engine logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureType {
    Simple,
    Advanced,
    Qualified,
}

/// Ordering discipline among signers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningOrder {
    /// Signers act one at a time, lowest `order` first
    Sequential,
    /// All signers may act concurrently, in any order
    Parallel,
}

impl std::fmt::Display for SigningOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningOrder::Sequential => f.write_str("SEQUENTIAL"),
            SigningOrder::Parallel => f.write_str("PARALLEL"),
        }
    }
}

/// Top-level request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Declined,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed
                | RequestStatus::Declined
                | RequestStatus::Expired
                | RequestStatus::Cancelled
        )
    }

    /// Still eligible for the expiration sweep
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Expired)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Declined)
                | (InProgress, Expired)
                | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::InProgress => "IN_PROGRESS",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Declined => "DECLINED",
            RequestStatus::Expired => "EXPIRED",
            RequestStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

// ── Signature Request ────────────────────────────────────────────────

/// A request for one or more signers to sign a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub id: RequestId,
    pub document_ref: DocumentRef,
    pub signature_type: SignatureType,
    pub signing_order: SigningOrder,
    pub status: RequestStatus,
    /// Ordered by `order`, never empty
    pub signers: Vec<SignerRequirement>,
    /// Signatures produced so far; append-only
    #[serde(default)]
    pub signatures: Vec<Signature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<String>,
    /// Completion certificate, attached after the request completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_ref: Option<String>,
    /// Bumped on every committed write
    pub version: u64,
}

impl SignatureRequest {
    /// Build a new `Pending` request at version 0. Validation of the
    /// signer list is the manager's job.
    pub fn new(
        id: RequestId,
        document_ref: DocumentRef,
        signature_type: SignatureType,
        signing_order: SigningOrder,
        mut signers: Vec<SignerRequirement>,
        now: DateTime<Utc>,
    ) -> Self {
        signers.sort_by_key(|s| s.order);
        Self {
            id,
            document_ref,
            signature_type,
            signing_order,
            status: RequestStatus::Pending,
            signers,
            signatures: Vec::new(),
            expires_at: None,
            message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_by: None,
            certificate_ref: None,
            version: 0,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `expires_at ≤ now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    pub fn signer(&self, email: &str) -> Option<&SignerRequirement> {
        self.signers.iter().find(|s| s.is_signer(email))
    }

    pub fn signer_mut(&mut self, email: &str) -> Option<&mut SignerRequirement> {
        self.signers.iter_mut().find(|s| s.is_signer(email))
    }

    pub fn all_signed(&self) -> bool {
        self.signers
            .iter()
            .all(|s| s.status == crate::SignerStatus::Signed)
    }

    /// Requirements that can still act
    pub fn outstanding(&self) -> impl Iterator<Item = &SignerRequirement> {
        self.signers.iter().filter(|s| !s.is_terminal())
    }

    /// Move the top-level status, enforcing the request lifecycle.
    pub fn transition_to(&mut self, next: RequestStatus, now: DateTime<Utc>) -> SigningResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(SigningError::InvalidRequestTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        if next == RequestStatus::Completed {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Void every non-terminal requirement; returns how many changed.
    pub fn void_outstanding(&mut self) -> usize {
        self.signers
            .iter_mut()
            .map(|s| s.void())
            .filter(|changed| *changed)
            .count()
    }

    /// Fail with a conflict when the request can no longer be acted on.
    pub fn ensure_open(&self) -> SigningResult<()> {
        if self.is_terminal() {
            return Err(SigningError::RequestTerminal {
                request_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}
