//! Identifiers and the canonical private room resolver.
//!
//! Two clients opening a 1:1 chat must land in the same room without
//! negotiating. The private room id is therefore a pure, order-independent
//! function of the two member ids: sort, then join with
//! [`ROOM_ID_SEPARATOR`]. Group room ids are generated by the creator and only
//! validated here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Separator joining the two sorted member ids of a private room.
///
/// User ids containing this character are rejected by the resolver, since
/// `"a_b" + "c"` and `"a" + "b_c"` would otherwise collide.
pub const ROOM_ID_SEPARATOR: char = '_';

/// Stable, unique user identity issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user id, rejecting empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Result<Self, ChatError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ChatError::InvalidIdentity("user id is empty".into()));
        }
        Ok(Self(raw))
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room identifier. Deterministic for private rooms, generated for groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Accept an externally generated group room id.
    ///
    /// The id is not derived from membership; it only has to be non-empty.
    pub fn group(raw: impl Into<String>) -> Result<Self, ChatError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ChatError::InvalidIdentity("room id is empty".into()));
        }
        Ok(Self(raw))
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a store-assigned document id.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical room id for a conversation between exactly two users.
///
/// Commutative: `resolve_private_room_id(a, b) == resolve_private_room_id(b,
/// a)`.
///
/// # Errors
///
/// - `InvalidIdentity` if either id is empty, contains
///   [`ROOM_ID_SEPARATOR`], or both ids are equal (self-chat is not
///   representable).
pub fn resolve_private_room_id(a: &UserId, b: &UserId) -> Result<RoomId, ChatError> {
    for id in [a, b] {
        if id.as_str().is_empty() {
            return Err(ChatError::InvalidIdentity("user id is empty".into()));
        }
        if id.as_str().contains(ROOM_ID_SEPARATOR) {
            return Err(ChatError::InvalidIdentity(format!(
                "user id {id} contains the room id separator"
            )));
        }
    }
    if a == b {
        return Err(ChatError::InvalidIdentity(format!(
            "cannot open a private room with self ({a})"
        )));
    }

    let (low, high) = if a < b { (a, b) } else { (b, a) };
    Ok(RoomId(format!("{low}{ROOM_ID_SEPARATOR}{high}")))
}
