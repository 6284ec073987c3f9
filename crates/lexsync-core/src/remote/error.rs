//! Remote store error handling
//!
//! Every transport maps its failures into this small taxonomy so nothing
//! HTTP- or client-specific leaks into the sync engine.

use thiserror::Error;

/// Errors reported by a snapshot transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No credentials or endpoint configured
    #[error("Remote store is not configured")]
    NotConfigured,

    /// Credentials were rejected
    #[error("Remote store rejected the credentials. Check the access token.")]
    Unauthorized,

    /// The requested document or resource does not exist
    #[error("Remote resource not found: {0}")]
    NotFound(String),

    /// The service answered with an error status
    #[error("Remote service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// Network or client failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Content was truncated and the follow-up fetch failed
    #[error("Content was truncated and the full copy at '{location}' could not be fetched: {reason}")]
    Truncated { location: String, reason: String },

    /// Response could not be understood
    #[error("Invalid response from remote store: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Classify an HTTP error status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => RemoteError::Unauthorized,
            404 => RemoteError::NotFound(message.into()),
            _ => RemoteError::Service {
                status,
                message: message.into(),
            },
        }
    }

    /// Check if retrying later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) | RemoteError::Truncated { .. } => true,
            RemoteError::Service { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;
