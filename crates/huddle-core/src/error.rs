//! Error types for chat operations.
//!
//! One taxonomy for every one-shot operation of the sync core. Store-level
//! failures are folded in through `From<StoreError>` so callers only ever
//! match on [`ChatError`].

use thiserror::Error;

use crate::{identity::AuthError, ids::RoomId, store::StoreError};

/// Errors surfaced by room, message and group operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Missing or malformed user identifier.
    ///
    /// Fatal to the requested operation and never retried. Raised for empty
    /// ids, self-chats, and ids containing the room id separator.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// Transport or connectivity failure talking to the store.
    ///
    /// Recoverable: the caller may retry the specific one-shot operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store-level authorization rejection. Never retried.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Attempt to act on behalf of a non-member, or to leave a room with an
    /// invalid membership.
    #[error("membership violation: {0}")]
    MembershipViolation(String),

    /// Message text is empty after trimming whitespace.
    #[error("message text is empty")]
    EmptyMessage,

    /// Group name is blank.
    #[error("invalid group: {0}")]
    InvalidGroup(String),

    /// Room document does not exist.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// Store reported a missing document for a partial update.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Stored document could not be decoded into the data model.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Identity provider failure.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

impl ChatError {
    /// Returns true if this error is transient and the operation may succeed
    /// on retry.
    ///
    /// Only connectivity failures qualify. Validation and authorization
    /// failures will fail again with the same input.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::Auth(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
            StoreError::PermissionDenied { path } => Self::PermissionDenied(path),
            StoreError::NotFound { path, id } => Self::NotFound(format!("{path}/{id}")),
            StoreError::Serialization(reason) => Self::Malformed(reason),
        }
    }
}
