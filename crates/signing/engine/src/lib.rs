//! Multi-party signature workflow engine
//!
//! Coordinates signature requests across many signers:
//!
//! - [`SignatureRequestManager`]: create, query, cancel, remind, and the
//!   signer actions (view, sign, decline)
//! - [`SigningOrderCoordinator`]: sequential and parallel turn-taking
//! - [`AuthenticatorRegistry`]: per-method signer identity verification
//! - [`ExpirationScheduler`]: clock-driven expiry of overdue requests
//!
//! Every change to a request is committed together with its audit events
//! under optimistic concurrency control, so requests never need
//! cross-request locks.

#![deny(unsafe_code)]

pub mod auth;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod manager;
pub mod scheduler;
pub mod storage;

pub use auth::*;
pub use clock::*;
pub use collaborators::*;
pub use config::*;
pub use coordinator::*;
pub use manager::*;
pub use scheduler::*;
pub use storage::*;
