//! External collaborators: document storage, notification delivery and
//! certificate generation.
//!
//! The engine never renders documents, sends e-mail or issues certificates
//! itself; it only calls these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use signing_types::{
    DocumentRef, RequestId, RequestStatus, SignatureRequest, SignerRequirement,
};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Failure reported by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("failed: {0}")]
    Failed(String),
}

// ── Documents ───────────────────────────────────────────────────────────────

/// Resolves a document reference to its content
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, document_ref: &DocumentRef) -> Result<Vec<u8>, CollaboratorError>;
}

/// Hex BLAKE3 digest recorded on each signature
pub fn document_digest(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// In-memory document store for development and testing
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentRef, Vec<u8>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, document_ref: DocumentRef, content: impl Into<Vec<u8>>) {
        let mut documents = self.documents.write().unwrap_or_else(|p| p.into_inner());
        documents.insert(document_ref, content.into());
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn fetch(&self, document_ref: &DocumentRef) -> Result<Vec<u8>, CollaboratorError> {
        let documents = self
            .documents
            .read()
            .map_err(|_| CollaboratorError::Unavailable("document store lock poisoned".into()))?;
        documents
            .get(document_ref)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(document_ref.to_string()))
    }
}

// ── Notifications ───────────────────────────────────────────────────────────

/// Messages the engine asks the notification layer to deliver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A signer has become eligible to act
    SigningRequested {
        request_id: RequestId,
        document_ref: DocumentRef,
        signer_email: String,
        signer_name: String,
        message: Option<String>,
    },
    /// A nudge for a signer who has not acted yet
    Reminder {
        request_id: RequestId,
        document_ref: DocumentRef,
        signer_email: String,
        reminder_count: u32,
    },
    /// The request reached a terminal state
    RequestClosed {
        request_id: RequestId,
        document_ref: DocumentRef,
        recipient_email: String,
        status: RequestStatus,
    },
}

impl Notification {
    pub fn signing_requested(request: &SignatureRequest, signer: &SignerRequirement) -> Self {
        Notification::SigningRequested {
            request_id: request.id,
            document_ref: request.document_ref.clone(),
            signer_email: signer.signer_email.clone(),
            signer_name: signer.signer_name.clone(),
            message: request.message.clone(),
        }
    }

    pub fn reminder(request: &SignatureRequest, signer: &SignerRequirement) -> Self {
        Notification::Reminder {
            request_id: request.id,
            document_ref: request.document_ref.clone(),
            signer_email: signer.signer_email.clone(),
            reminder_count: signer.reminder_count,
        }
    }

    pub fn request_closed(request: &SignatureRequest, recipient_email: &str) -> Self {
        Notification::RequestClosed {
            request_id: request.id,
            document_ref: request.document_ref.clone(),
            recipient_email: recipient_email.to_string(),
            status: request.status,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::SigningRequested { .. } => "signing_requested",
            Notification::Reminder { .. } => "reminder",
            Notification::RequestClosed { .. } => "request_closed",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::SigningRequested { signer_email, .. }
            | Notification::Reminder { signer_email, .. } => signer_email,
            Notification::RequestClosed { recipient_email, .. } => recipient_email,
        }
    }
}

/// Delivers notifications. Delivery failures never roll back engine state.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<(), CollaboratorError>;
}

/// Dispatcher that only writes a log line
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl NotificationDispatcher for LoggingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), CollaboratorError> {
        tracing::info!(
            kind = notification.kind(),
            recipient = notification.recipient(),
            "Notification dispatched"
        );
        Ok(())
    }
}

// ── Certificates ────────────────────────────────────────────────────────────

/// Produces signing certificates.
///
/// `completion_certificate` runs once a request is `Completed`; its reference
/// is stored on the request. `signer_certificate` may attach a per-signer
/// reference to each signature.
#[async_trait]
pub trait CertificateGenerator: Send + Sync {
    async fn signer_certificate(
        &self,
        _request: &SignatureRequest,
        _signer: &SignerRequirement,
    ) -> Result<Option<String>, CollaboratorError> {
        Ok(None)
    }

    async fn completion_certificate(
        &self,
        request: &SignatureRequest,
    ) -> Result<String, CollaboratorError>;
}

/// Generator whose reference is a digest over the request's signatures
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestCertificateGenerator;

#[async_trait]
impl CertificateGenerator for DigestCertificateGenerator {
    async fn completion_certificate(
        &self,
        request: &SignatureRequest,
    ) -> Result<String, CollaboratorError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(request.id.to_string().as_bytes());
        for signature in &request.signatures {
            hasher.update(signature.id.to_string().as_bytes());
            hasher.update(signature.document_hash.as_bytes());
            hasher.update(signature.signature_data.as_bytes());
        }
        Ok(format!("cert:{}", hasher.finalize().to_hex()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_document_store_roundtrip() {
        let store = InMemoryDocumentStore::new();
        let doc = DocumentRef::new("doc-1");
        store.put(doc.clone(), b"contract body".to_vec());

        let content = store.fetch(&doc).await.unwrap();
        assert_eq!(document_digest(&content), document_digest(b"contract body"));

        let missing = store.fetch(&DocumentRef::new("nope")).await.unwrap_err();
        assert!(matches!(missing, CollaboratorError::NotFound(_)));
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let digest = document_digest(b"abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, document_digest(b"abc"));
        assert_ne!(digest, document_digest(b"abd"));
    }

    #[test]
    fn test_notification_serializes_with_kind_tag() {
        let n = Notification::Reminder {
            request_id: RequestId::generate(),
            document_ref: DocumentRef::new("doc-1"),
            signer_email: "a@example.com".into(),
            reminder_count: 2,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "reminder");
        assert_eq!(n.recipient(), "a@example.com");
    }
}
