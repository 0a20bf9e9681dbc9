//! In-memory storage implementation

use super::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use signing_audit::{AuditRecorder, InMemoryAuditRecorder};
use signing_types::{AuditEvent, DocumentRef, PendingAuditEvent, RequestId, SignatureRequest};
use std::sync::Arc;

/// In-memory request store for development and testing.
///
/// Each commit holds only its own entry's lock; unrelated requests never
/// contend.
pub struct InMemoryRequestStore {
    requests: DashMap<RequestId, SignatureRequest>,
    recorder: Arc<dyn AuditRecorder>,
}

impl Default for InMemoryRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRequestStore {
    /// Create a store with its own in-memory audit recorder
    pub fn new() -> Self {
        Self::with_recorder(Arc::new(InMemoryAuditRecorder::new()))
    }

    pub fn with_recorder(recorder: Arc<dyn AuditRecorder>) -> Self {
        Self {
            requests: DashMap::new(),
            recorder,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn get(&self, id: &RequestId) -> StorageResult<Option<SignatureRequest>> {
        Ok(self.requests.get(id).map(|entry| entry.value().clone()))
    }

    async fn insert(
        &self,
        request: SignatureRequest,
        events: Vec<PendingAuditEvent>,
    ) -> StorageResult<Vec<AuditEvent>> {
        match self.requests.entry(request.id) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(request.id)),
            Entry::Vacant(slot) => {
                let sealed = self.recorder.append_batch(events)?;
                slot.insert(request);
                Ok(sealed)
            }
        }
    }

    async fn commit(
        &self,
        expected_version: u64,
        request: SignatureRequest,
        events: Vec<PendingAuditEvent>,
    ) -> StorageResult<Vec<AuditEvent>> {
        let mut entry = self
            .requests
            .get_mut(&request.id)
            .ok_or(StorageError::NotFound(request.id))?;

        let actual = entry.version;
        if actual != expected_version {
            return Err(StorageError::VersionConflict {
                request_id: request.id,
                expected: expected_version,
                actual,
            });
        }
        if request.version != expected_version + 1 {
            return Err(StorageError::Backend(format!(
                "request {} must be stamped with version {}, got {}",
                request.id,
                expected_version + 1,
                request.version
            )));
        }

        // Audit first: a failed append leaves the stored state untouched.
        let sealed = self.recorder.append_batch(events)?;
        *entry = request;
        Ok(sealed)
    }

    async fn list_for_document(
        &self,
        document_ref: &DocumentRef,
    ) -> StorageResult<Vec<SignatureRequest>> {
        let mut matches: Vec<SignatureRequest> = self
            .requests
            .iter()
            .filter(|entry| &entry.document_ref == document_ref)
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by_key(|r| r.created_at);
        Ok(matches)
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> StorageResult<Vec<RequestId>> {
        let mut due: Vec<(DateTime<Utc>, RequestId)> = self
            .requests
            .iter()
            .filter(|entry| entry.status.is_open() && entry.is_overdue(now))
            .filter_map(|entry| entry.expires_at.map(|at| (at, entry.id)))
            .collect();
        due.sort();
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }

    fn audit_recorder(&self) -> Arc<dyn AuditRecorder> {
        Arc::clone(&self.recorder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use signing_types::{
        AuditAction, AuditActor, RequestStatus, SignatureType, SignerRequirement, SignerSpec,
        SigningOrder,
    };

    fn request(document: &str) -> SignatureRequest {
        let id = RequestId::generate();
        let signer = SignerRequirement::new(id, &SignerSpec::new("a@example.com", "A"), 1);
        SignatureRequest::new(
            id,
            DocumentRef::new(document),
            SignatureType::Simple,
            SigningOrder::Parallel,
            vec![signer],
            Utc::now(),
        )
    }

    fn created(request: &SignatureRequest) -> PendingAuditEvent {
        PendingAuditEvent::new(request.id, AuditActor::System, AuditAction::Created, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryRequestStore::new();
        let req = request("doc-1");
        let events = store.insert(req.clone(), vec![created(&req)]).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(store.get(&req.id).await.unwrap(), Some(req.clone()));

        let err = store.insert(req.clone(), vec![]).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_commit_checks_version() {
        let store = InMemoryRequestStore::new();
        let mut req = request("doc-1");
        store.insert(req.clone(), vec![created(&req)]).await.unwrap();

        req.version = 1;
        req.status = RequestStatus::InProgress;
        store.commit(0, req.clone(), vec![]).await.unwrap();

        // A writer that read version 0 loses.
        let mut stale = req.clone();
        stale.version = 1;
        stale.status = RequestStatus::Cancelled;
        let err = store
            .commit(0, stale, vec![created(&req)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict { expected: 0, actual: 1, .. }
        ));

        // Losing commit recorded nothing.
        let audit = store.audit_recorder().list_for_request(&req.id).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(
            store.get(&req.id).await.unwrap().unwrap().status,
            RequestStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_list_for_document_and_overdue() {
        let store = InMemoryRequestStore::new();
        let now = Utc::now();

        let due = request("doc-1").with_expiry(now - Duration::minutes(1));
        let later = request("doc-1").with_expiry(now + Duration::days(1));
        let other = request("doc-2");
        for r in [&due, &later, &other] {
            store.insert(r.clone(), vec![]).await.unwrap();
        }

        let for_doc = store
            .list_for_document(&DocumentRef::new("doc-1"))
            .await
            .unwrap();
        assert_eq!(for_doc.len(), 2);

        let overdue = store.list_overdue(now).await.unwrap();
        assert_eq!(overdue, vec![due.id]);
    }
}
