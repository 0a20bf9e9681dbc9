//! Audit recorder: the append-only event log

use crate::chain::{seal, ChainVerification, IntegrityVerifier};
use crate::error::{AuditError, AuditResult};
use signing_types::{AuditEvent, PendingAuditEvent, RequestId};
use dashmap::DashMap;

/// Append-only audit log.
///
/// `append_batch` is the only mutating operation. It is synchronous so a
/// request store can call it inside the same critical section that commits
/// the request state; the audit order then equals the durable apply order.
pub trait AuditRecorder: Send + Sync {
    /// Append events for a single request, all or nothing.
    fn append_batch(&self, events: Vec<PendingAuditEvent>) -> AuditResult<Vec<AuditEvent>>;

    /// Append a single event
    fn append(&self, event: PendingAuditEvent) -> AuditResult<AuditEvent> {
        self.append_batch(vec![event])?
            .pop()
            .ok_or_else(|| AuditError::Storage("empty append result".into()))
    }

    /// All events for a request in sequence order
    fn list_for_request(&self, request_id: &RequestId) -> AuditResult<Vec<AuditEvent>>;

    /// Recompute and check the request's hash chain
    fn verify(&self, request_id: &RequestId) -> AuditResult<ChainVerification> {
        let events = self.list_for_request(request_id)?;
        Ok(IntegrityVerifier::verify_chain(&events))
    }
}

/// In-memory recorder for development and testing.
///
/// Each request's chain is locked on its own; appends for unrelated
/// requests do not wait on each other.
#[derive(Debug, Default)]
pub struct InMemoryAuditRecorder {
    chains: DashMap<RequestId, Vec<AuditEvent>>,
}

impl InMemoryAuditRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total events across all requests
    pub fn total_count(&self) -> usize {
        self.chains.iter().map(|chain| chain.len()).sum()
    }
}

impl AuditRecorder for InMemoryAuditRecorder {
    fn append_batch(&self, events: Vec<PendingAuditEvent>) -> AuditResult<Vec<AuditEvent>> {
        let Some(first) = events.first() else {
            return Ok(Vec::new());
        };
        let request_id = first.request_id;
        if let Some(stray) = events.iter().find(|e| e.request_id != request_id) {
            return Err(AuditError::MixedBatch {
                expected: request_id,
                found: stray.request_id,
            });
        }

        let mut chain = self.chains.entry(request_id).or_default();

        let mut sealed = Vec::with_capacity(events.len());
        for pending in events {
            let sequence = chain.len() as u64 + 1;
            let previous_hash = chain.last().map(|e| e.entry_hash.clone());
            let event = seal(pending, sequence, previous_hash);
            tracing::trace!(
                request_id = %event.request_id,
                sequence = event.sequence,
                action = %event.action,
                "Audit event recorded"
            );
            chain.push(event.clone());
            sealed.push(event);
        }

        Ok(sealed)
    }

    fn list_for_request(&self, request_id: &RequestId) -> AuditResult<Vec<AuditEvent>> {
        Ok(self
            .chains
            .get(request_id)
            .map(|chain| chain.clone())
            .unwrap_or_default())
    }
}
