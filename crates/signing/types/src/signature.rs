//! Signatures produced when a signer requirement reaches `Signed`

use crate::{RequestId, SignatureId, SignerRequirementId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable signature record.
///
/// Created exactly once per requirement that reaches `Signed`. Signatures
/// survive cancellation and expiry of their request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub id: SignatureId,
    pub request_id: RequestId,
    pub signer_requirement_id: SignerRequirementId,
    pub signer_email: String,
    /// Opaque payload supplied by the signer (drawn image, typed name, hash)
    pub signature_data: String,
    /// BLAKE3 digest (hex) of the document content at signing time
    pub document_hash: String,
    pub signed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_ref: Option<String>,
}
