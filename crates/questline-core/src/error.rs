//! Core error types for questline-core.
//!
//! This module defines the error hierarchy using thiserror. Store and
//! validation failures carry their own enums and fold into [`CoreError`]
//! at the component boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for questline-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No signed-in user for an operation that requires one
    #[error("No signed-in user")]
    Unauthorized,

    /// A referenced record does not exist
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Store-related errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A persisted document failed to decode into its record type
    #[error("Malformed document at '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Malformed key path (empty, or with an empty segment)
    #[error("Invalid key path: '{0}'")]
    InvalidPath(String),

    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Backing database is locked
    #[error("Store is locked")]
    Locked,

    /// A document could not be serialized for persistence
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Validation errors for user-editable challenge fields.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Challenge title is empty or whitespace
    #[error("Challenge title must not be empty")]
    EmptyTitle,

    /// Challenge target below the minimum of one
    #[error("Challenge target must be at least 1, got {0}")]
    TargetTooSmall(u32),

    /// Group name set but empty
    #[error("Challenge group must not be empty when set")]
    EmptyGroup,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
