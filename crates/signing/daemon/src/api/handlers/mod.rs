//! API request handlers

mod audit;
mod documents;
mod events;
mod health;
mod requests;
mod signers;

pub use audit::*;
pub use documents::*;
pub use events::*;
pub use health::*;
pub use requests::*;
pub use signers::*;

use crate::error::ApiError;
use signing_types::RequestId;

/// Parse a request ID path segment (bare UUID or `sigreq:` prefixed)
pub(crate) fn parse_request_id(raw: &str) -> Result<RequestId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid request id '{}': {}", raw, e)))
}
