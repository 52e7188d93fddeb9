//! Error types for provider fetching

use thiserror::Error;

/// Errors that can occur while fetching from a provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NewsError {
    /// Request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No usable credential for the provider
    #[error("Missing API key for {0}")]
    MissingKey(String),

    /// Non-2xx HTTP response
    #[error("Server error (status {status})")]
    ServerError {
        /// HTTP status code
        status: u16,
    },

    /// Payload did not match the expected shape
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Request exceeded its deadline
    #[error("Request timed out")]
    Timeout,

    /// Every key rotation attempt was rejected
    #[error("Rate limit exceeded for {provider} after {attempts} attempts")]
    RateLimitExceeded {
        /// Provider id
        provider: String,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Any other transport failure (DNS, TLS, connection reset, ...)
    #[error("Transport error: {0}")]
    Transport(String),
}

impl NewsError {
    /// Auth and rate-limit rejections, answered by rotating to the next key
    pub fn is_rotatable(&self) -> bool {
        matches!(self, NewsError::ServerError { status: 401 | 403 | 429 })
    }

    /// Failures worth retrying with backoff: 5xx and transient transport errors
    pub fn is_retryable(&self) -> bool {
        match self {
            NewsError::ServerError { status } => *status >= 500,
            NewsError::Timeout | NewsError::Transport(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for NewsError {
    fn from(err: reqwest::Error) -> Self {
        // The URL may carry an API key in its query string
        let err = err.without_url();
        if err.is_timeout() {
            NewsError::Timeout
        } else if err.is_decode() {
            NewsError::Decoding(err.to_string())
        } else if let Some(status) = err.status() {
            NewsError::ServerError {
                status: status.as_u16(),
            }
        } else {
            NewsError::Transport(err.to_string())
        }
    }
}
