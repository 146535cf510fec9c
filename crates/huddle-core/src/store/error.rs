//! Store error types.
//!
//! Defines errors that can occur during document store operations:
//! - `Unavailable`: transport or connectivity failure
//! - `PermissionDenied`: store-side authorization rejection
//! - `NotFound`: partial update of a document that does not exist
//! - `Serialization`: failed to encode/decode a document body

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached. Transient.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Store rejected the operation for the current identity.
    #[error("permission denied on {path}")]
    PermissionDenied {
        /// Collection or document path that was rejected
        path: String,
    },

    /// Document not found
    #[error("document not found: {path}/{id}")]
    NotFound {
        /// Collection path
        path: String,
        /// Document id that was not found
        id: String,
    },

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
