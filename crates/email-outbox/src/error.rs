//! Outbox error types.

use outbox_store::StoreError;
use thiserror::Error;

/// Invocation-level error. Any of these aborts the whole run.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// The claim call failed; nothing was processed.
    #[error("Claim failed: {0}")]
    Claim(#[from] StoreError),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Per-item delivery failure. Recorded on the row, never propagated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    /// Row content rejected before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The provider did not answer within the configured timeout.
    #[error("Provider request timed out")]
    Timeout,

    /// Connection or transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status.
    #[error("Provider error: HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    /// Provider answered 2xx without a message id.
    #[error("Provider response missing message id")]
    MissingMessageId,
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type alias using DeliveryError.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
