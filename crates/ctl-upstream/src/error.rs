//! Upstream error types.

use thiserror::Error;

/// Errors talking to the upstream API.
///
/// Cloneable so a single login result can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The upstream rejected the session or the login.
    #[error("authentication rejected: {0}")]
    TransientAuth(String),

    /// Too many consecutive failed logins; the connection is disabled.
    #[error("login disabled: {0}")]
    Fatal(String),

    /// Non-success status other than an auth rejection.
    #[error("API error: {status} - {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not finish in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// Creates an auth rejection.
    #[must_use]
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::TransientAuth(msg.into())
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Checks if this is an auth rejection that a fresh login may fix.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::TransientAuth(_))
    }

    /// Checks if this is the fatal login error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Checks if a later attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientAuth(_) | Self::Transport(_) | Self::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for UpstreamError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;
