//! Signing daemon library
//!
//! Hosts the signature workflow engine behind a REST API:
//! - REST API handlers
//! - Expiration scheduler lifecycle
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
