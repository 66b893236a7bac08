//! Remote service error types.

use thiserror::Error;

/// Errors that can occur when talking to the memlab backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The backend answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The backend answered 200 but reported a failure in the body.
    #[error("server error: {0}")]
    ServerError(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl RemoteError {
    /// Returns `true` for failures that happened before any response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Timeout(_) | RemoteError::NetworkError(_))
    }
}
