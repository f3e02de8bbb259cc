//! Game service client errors.

use thiserror::Error;

/// Result type for game service calls.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the game service boundary.
///
/// Step functions receive these verbatim; the session engine translates
/// them into one generic user-facing failure message.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level failure after exhausting transparent retries.
    #[error("request to game service failed: {0}")]
    Transport(reqwest::Error),

    /// The service did not respond within the configured timeout.
    #[error("game service did not respond in time")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("game service error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    /// Classify a reqwest error: timeouts get their own variant.
    pub(super) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(err)
        }
    }
}
