//! Signature Workflow Domain Types
//!
//! A signing workflow drives one or more signers to a legally meaningful
//! act (signing or declining) against a single document.
//!
//! # Key Concepts
//!
//! - **SignatureRequest**: the unit of work and of concurrency control.
//!   It owns its signer requirements and the signatures they produce,
//!   and carries a `version` used for optimistic writes.
//! - **SignerRequirement**: one party's obligation to sign or decline.
//!   Its status only ever moves forward.
//! - **Signature**: the immutable record produced when a requirement
//!   reaches `Signed`.
//! - **AuditEvent**: an append-only, hash-chained record of every
//!   state change applied to a request.
//!
//! Terminal request states (`Completed`, `Declined`, `Expired`,
//! `Cancelled`) are final: once reached, no requirement changes status.

#![deny(unsafe_code)]

mod audit;
mod errors;
mod ids;
mod request;
mod signature;
mod signer;

pub use audit::*;
pub use errors::*;
pub use ids::*;
pub use request::*;
pub use signature::*;
pub use signer::*;
