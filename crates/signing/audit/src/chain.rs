//! Hash chain construction and verification

use serde::Serialize;
use sha2::{Digest, Sha256};
use signing_types::{AuditEvent, AuditEventId, PendingAuditEvent};

/// Seal a pending event into its final, hash-chained form.
pub(crate) fn seal(
    pending: PendingAuditEvent,
    sequence: u64,
    previous_hash: Option<String>,
) -> AuditEvent {
    let mut event = AuditEvent {
        id: AuditEventId::generate(),
        request_id: pending.request_id,
        sequence,
        actor: pending.actor,
        action: pending.action,
        timestamp: pending.timestamp,
        metadata: pending.metadata,
        previous_hash,
        entry_hash: String::new(),
    };
    event.entry_hash = compute_hash(&event);
    event
}

/// Hash every field except `entry_hash` itself.
fn compute_hash(event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.id.to_string().as_bytes());
    hasher.update(event.request_id.to_string().as_bytes());
    hasher.update(event.sequence.to_be_bytes());
    hasher.update(json(&event.actor).as_bytes());
    hasher.update(event.action.to_string().as_bytes());
    hasher.update(
        event
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
            .as_bytes(),
    );
    hasher.update(json(&event.metadata).as_bytes());
    hasher.update(event.previous_hash.as_deref().unwrap_or("").as_bytes());
    hex::encode(hasher.finalize())
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Outcome of verifying one request's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub total_events: usize,
    pub verified_events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_invalid_sequence: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Verifies the integrity of a request's audit events
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    pub fn verify_event(event: &AuditEvent) -> bool {
        compute_hash(event) == event.entry_hash
    }

    /// Verify hashes, linkage, and gap-free sequencing of an ordered chain.
    pub fn verify_chain(events: &[AuditEvent]) -> ChainVerification {
        let mut result = ChainVerification {
            valid: true,
            total_events: events.len(),
            verified_events: 0,
            first_invalid_sequence: None,
            error_message: None,
        };

        let mut previous: Option<&AuditEvent> = None;
        for (index, event) in events.iter().enumerate() {
            let expected_sequence = index as u64 + 1;
            let failure = if event.sequence != expected_sequence {
                Some(format!(
                    "sequence gap: expected {}, found {}",
                    expected_sequence, event.sequence
                ))
            } else if !Self::verify_event(event) {
                Some(format!("event {} has an invalid hash", event.id))
            } else if event.previous_hash.as_ref() != previous.map(|p| &p.entry_hash) {
                Some(format!("event {} has a broken chain link", event.id))
            } else {
                None
            };

            if let Some(message) = failure {
                result.valid = false;
                result.first_invalid_sequence = Some(event.sequence);
                result.error_message = Some(message);
                return result;
            }

            result.verified_events = index + 1;
            previous = Some(event);
        }

        result
    }
}
