//! Backend error types

use reqwest::StatusCode;
use thiserror::Error;

/// Text-generation or embedding backend error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP status returned by a backend
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
        match status.as_u16() {
            401 | 403 => Self::auth(message),
            429 => Self::rate_limit(message),
            400..=499 => Self::invalid_request(message),
            500..=599 => Self::server_error(message),
            _ => Self::unknown(message),
        }
    }

    /// Classify a transport-level failure
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("Request timeout: {err}"))
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else {
            Self::unknown(format!("Request failed: {err}"))
        }
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Network issues, timeouts - retryable
    Network,
    /// Rate limited (429) - retryable with backoff
    RateLimit,
    /// Server error (5xx) - retryable
    ServerError,
    /// Authentication failed (401, 403) - not retryable
    Auth,
    /// Bad request (400) - not retryable
    InvalidRequest,
    /// Unknown error
    Unknown,
}

impl LlmErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }
}
