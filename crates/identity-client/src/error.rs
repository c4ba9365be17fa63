//! Identity adapter error types.

use thiserror::Error;

/// Error returned by an [`IdentityClient`](crate::IdentityClient).
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The service answered with a non-success status
    #[error("Identity service rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// No stored session to act on
    #[error("No session")]
    NoSession,

    /// A token could not be decoded
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error from the session store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl IdentityError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors are connection failures, timeouts, and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            IdentityError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            IdentityError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// True when the request never got an answer from the service. An
    /// answer whose body could not be decoded does not count.
    pub fn is_transport(&self) -> bool {
        matches!(self, IdentityError::Http(e) if e.status().is_none() && !e.is_decode())
    }

    /// HTTP status of a rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            IdentityError::Rejected { status, .. } => Some(*status),
            IdentityError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias using IdentityError.
pub type IdentityResult<T> = Result<T, IdentityError>;
