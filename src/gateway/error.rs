//! Gateway error types.

use thiserror::Error;

/// Errors surfaced by a remote gateway.
///
/// Carries only owned strings so the store can keep the last failure around
/// for the UI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not authorized; check the API key")]
    Unauthorized,

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Change feed error: {0}")]
    Subscription(String),

    #[error("Rejected by remote store: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Connection(e.to_string())
        }
    }
}
