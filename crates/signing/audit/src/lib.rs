//! Audit trail for signature workflows
//!
//! Every state change applied to a signature request is recorded as an
//! [`AuditEvent`](signing_types::AuditEvent). Events are:
//!
//! - **append-only**: there is no update or delete operation
//! - **sequenced per request**: ordering never depends on wall-clock alone
//! - **hash-chained per request**: each event commits to its predecessor,
//!   so any edit or removal is detectable by [`IntegrityVerifier`]

#![deny(unsafe_code)]

mod chain;
mod error;
mod recorder;

pub use chain::{ChainVerification, IntegrityVerifier};
pub use error::{AuditError, AuditResult};
pub use recorder::{AuditRecorder, InMemoryAuditRecorder};
