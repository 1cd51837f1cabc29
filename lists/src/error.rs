//! Error types for the list screens.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached.
    NetworkUnavailable,
    /// The request exceeded its time budget.
    Timeout,
    /// The backend answered with something that is not a list payload.
    MalformedResponse,
    /// The request was refused client-side before reaching the network.
    ValidationFailure,
}

/// Failures of a list fetch.
///
/// Only the list controller recovers from these; every variant carries owned
/// data so errors can travel inside actions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection refused, DNS failure, TLS failure, dropped connection.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The request was aborted after its time budget.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx status or a body that is not JSON.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A client-side precondition does not hold (missing session, missing
    /// required filter). Never retried automatically.
    #[error("Validation failed: {0}")]
    ValidationFailure(String),
}

impl FetchError {
    /// The error's kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::ValidationFailure(_) => ErrorKind::ValidationFailure,
        }
    }

    /// Transient failures keep the last rendered list and offer a retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_) | Self::Timeout(_))
    }

    /// Map a transport error, using `timeout` as the budget for timeouts.
    #[must_use]
    pub fn from_transport(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if error.is_decode() {
            Self::MalformedResponse(error.to_string())
        } else {
            Self::NetworkUnavailable(error.to_string())
        }
    }
}

/// Failures of the secure credential store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The backing store could not be read or written.
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    /// The store does not accept writes.
    #[error("Credential store is read-only")]
    ReadOnly,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Missing environment variable {0}")]
    MissingVar(&'static str),

    /// The UTC offset is not a whole number of minutes within ±24h.
    #[error("Invalid UTC offset: {0}")]
    InvalidOffset(String),

    /// No filter with this wire name.
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    /// No endpoint preset with this name.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}
