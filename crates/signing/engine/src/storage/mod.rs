//! Storage layer for signature requests
//!
//! Requests are persisted with an optimistic version counter. Every state
//! change is committed together with its audit events.

mod memory;
mod traits;

pub use memory::InMemoryRequestStore;
pub use traits::{RequestStore, StorageError, StorageResult};
