//! Audit events: the append-only trail of every workflow state change

use crate::{AuditEventId, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Created,
    Sent,
    Viewed,
    Signed,
    Declined,
    Reminded,
    Cancelled,
    Expired,
    Completed,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuditAction::Created => "CREATED",
            AuditAction::Sent => "SENT",
            AuditAction::Viewed => "VIEWED",
            AuditAction::Signed => "SIGNED",
            AuditAction::Declined => "DECLINED",
            AuditAction::Reminded => "REMINDED",
            AuditAction::Cancelled => "CANCELLED",
            AuditAction::Expired => "EXPIRED",
            AuditAction::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

/// Who did it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AuditActor {
    /// A signer, identified by e-mail
    Signer(String),
    /// An application user acting on the request (e.g. cancelling it)
    User(String),
    /// The engine itself (activation, expiry)
    System,
}

impl std::fmt::Display for AuditActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditActor::Signer(email) => write!(f, "signer:{}", email),
            AuditActor::User(id) => write!(f, "user:{}", id),
            AuditActor::System => f.write_str("system"),
        }
    }
}

/// An audit event before the recorder has sequenced and hashed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuditEvent {
    pub request_id: RequestId,
    pub actor: AuditActor,
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
    /// IP, user agent, reasons, signer e-mail. Ordered for stable hashing.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PendingAuditEvent {
    pub fn new(
        request_id: RequestId,
        actor: AuditActor,
        action: AuditAction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            actor,
            action,
            timestamp,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Insert a metadata value only when present
    pub fn with_optional(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with_metadata(key, v),
            None => self,
        }
    }
}

/// A recorded audit event. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub request_id: RequestId,
    /// Per-request position, starting at 1 with no gaps
    pub sequence: u64,
    pub actor: AuditActor,
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Hash of the previous event for the same request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_serialization() {
        let json = serde_json::to_value(AuditActor::Signer("a@example.com".into())).unwrap();
        assert_eq!(json["type"], "signer");
        assert_eq!(json["id"], "a@example.com");

        let system = serde_json::to_value(AuditActor::System).unwrap();
        assert_eq!(system["type"], "system");
    }

    #[test]
    fn test_optional_metadata() {
        let event = PendingAuditEvent::new(
            RequestId::generate(),
            AuditActor::System,
            AuditAction::Sent,
            Utc::now(),
        )
        .with_optional("ip_address", None)
        .with_optional("signer", Some("a@example.com"));

        assert_eq!(event.metadata.len(), 1);
        assert_eq!(event.metadata["signer"], "a@example.com");
    }
}
