//! Error types for outbox store operations.

use crate::OutboxStatus;
use thiserror::Error;

/// Error type for claim and update calls against an outbox store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or transport-level HTTP error from reqwest.
    ///
    /// Includes connection failures, timeouts, and TLS errors.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Supabase API returned a non-success HTTP status.
    ///
    /// Common causes: bad service key, missing claim procedure, schema mismatch.
    #[error("Supabase error: {status} - {message}")]
    Supabase {
        /// The HTTP status code returned by Supabase.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No row with the given id.
    #[error("Outbox item not found: {0}")]
    NotFound(String),

    /// The update would break the status lifecycle.
    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: OutboxStatus,
        to: OutboxStatus,
    },

    /// Failure injected or reported by a backing store.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
