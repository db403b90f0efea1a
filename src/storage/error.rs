//! Storage-specific error types.
//!
//! All storage operations return [`StorageError`] on failure. Construction
//! and connect faults (`Config`, `Connect`) are fatal to the caller;
//! steady-state query faults are routed through the store's error policy
//! and only surface when the store was built with `throw: true`.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Missing or invalid construction options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Initial connection or table provisioning failed.
    #[error("failed to connect: {0}")]
    Connect(String),

    /// Database operation failed (sqlx error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (e.g., filesystem failure during import).
    #[error("internal error: {0}")]
    Internal(String),
}
