//! Error types for the floorscan library.

use std::path::PathBuf;
use thiserror::Error;

use crate::object::ObjectStatus;

/// Main error type for floorscan operations.
#[derive(Debug, Error)]
pub enum FloorscanError {
    /// Unknown object or plan for the given tenant.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A status change the state machine does not allow.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: ObjectStatus, to: ObjectStatus },

    /// The caller-supplied authorization decision denied the action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed geometry or confidence encountered on a record.
    #[error("Data integrity error for '{object_id}': {message}")]
    DataIntegrity { object_id: String, message: String },

    /// Approval blocked by unresolved conflicts that need a human decision.
    #[error("Object '{object_id}' has {blocking} unresolved duplicate conflict(s)")]
    ValidationConflict { object_id: String, blocking: usize },

    /// Input rejected before reaching the store.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Optimistic update retries were exhausted.
    #[error("Concurrent modification of '{object_id}' after {attempts} attempts")]
    Concurrency { object_id: String, attempts: u32 },

    /// Error writing or reading a store snapshot.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Error reading a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML configuration could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background job panicked or was cancelled.
    #[error("Job error: {0}")]
    Job(String),
}

impl FloorscanError {
    /// Shorthand for a missing object.
    pub fn object_not_found(tenant_id: impl std::fmt::Display, id: impl std::fmt::Display) -> Self {
        FloorscanError::NotFound(format!("object '{}' in tenant '{}'", id, tenant_id))
    }
}

/// Result type alias for floorscan operations.
pub type Result<T> = std::result::Result<T, FloorscanError>;
