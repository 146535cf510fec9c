//! Persisted data model.
//!
//! Entities are stored as JSON objects with camelCase field names. Sets
//! (`members`, `seenBy`) are stored as arrays and decoded into `BTreeSet`s,
//! so duplicates written by racing clients collapse on read.
//!
//! Messages do not carry their id or creation time in their body: both are
//! assigned by the store and read from the [`DocumentSnapshot`] metadata.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    ids::{MessageId, RoomId, UserId},
    store::{DocumentSnapshot, StoreError, decode},
};

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Wrap a millisecond count.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Millisecond count.
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

/// Registered user profile, stored at `users/{userId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable identity.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Reference to the profile image (URL or storage key).
    #[serde(default)]
    pub profile_image_ref: String,
}

/// Conversation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// 1:1 conversation with a derived id.
    Private,
    /// Multi-member conversation with a generated id.
    Group,
}

/// Denormalized copy of the latest message, embedded in the room document
/// for list previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    /// Message text. Empty for the sentinel summary.
    pub text: String,
    /// Sender. `None` until the first message is sent.
    pub sender_id: Option<UserId>,
    /// Send time, or the room creation time for the sentinel.
    pub created_at: Timestamp,
    /// Users who have seen the message.
    #[serde(default)]
    pub seen_by: BTreeSet<UserId>,
    /// Sender display name at send time.
    #[serde(default)]
    pub sender_display_name: String,
    /// Sender image at send time.
    #[serde(default)]
    pub sender_image_ref: String,
}

impl MessageSummary {
    /// Placeholder written when a room is created.
    pub fn sentinel(created_at: Timestamp) -> Self {
        Self {
            text: String::new(),
            sender_id: None,
            created_at,
            seen_by: BTreeSet::new(),
            sender_display_name: String::new(),
            sender_image_ref: String::new(),
        }
    }

    /// True if no message has been projected onto the room yet.
    pub fn is_sentinel(&self) -> bool {
        self.sender_id.is_none()
    }

    /// Summary of a just-sent message. Only the sender has seen it.
    pub fn of(message: &Message) -> Self {
        Self {
            text: message.text.clone(),
            sender_id: Some(message.sender_id.clone()),
            created_at: message.created_at,
            seen_by: BTreeSet::from([message.sender_id.clone()]),
            sender_display_name: message.sender_display_name.clone(),
            sender_image_ref: message.sender_image_ref.clone(),
        }
    }
}

/// Conversation container, stored at `rooms/{roomId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Canonical id (also the document id).
    pub room_id: RoomId,
    /// Private or group.
    pub kind: RoomKind,
    /// Member ids. Always contains `created_by`.
    pub members: BTreeSet<UserId>,
    /// Room title. For private rooms, the peer's name as seen by the creator.
    pub display_name: String,
    /// Room image.
    #[serde(default)]
    pub image_ref: String,
    /// Creator.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Latest message preview.
    pub last_message: MessageSummary,
}

impl Room {
    /// Decode a room document.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<Self, StoreError> {
        decode(&snapshot.fields)
    }

    /// Whether `user` is currently a member.
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    /// The other participant of a private room, from `viewer`'s perspective.
    ///
    /// `None` for group rooms and for viewers outside the room.
    pub fn peer_of(&self, viewer: &UserId) -> Option<&UserId> {
        if self.kind != RoomKind::Private || !self.is_member(viewer) {
            return None;
        }
        self.members.iter().find(|member| *member != viewer)
    }
}

/// Stored body of a message document (`rooms/{roomId}/messages/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    /// Sender.
    pub sender_id: UserId,
    /// Trimmed, non-empty text.
    pub text: String,
    /// Sender display name at send time.
    #[serde(default)]
    pub sender_display_name: String,
    /// Sender image at send time.
    #[serde(default)]
    pub sender_image_ref: String,
    /// Users who have seen the message. Grows only.
    #[serde(default)]
    pub seen_by: BTreeSet<UserId>,
}

/// A message as observed by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned id.
    pub id: MessageId,
    /// Parent room.
    pub room_id: RoomId,
    /// Sender.
    pub sender_id: UserId,
    /// Text.
    pub text: String,
    /// Store-assigned creation time.
    pub created_at: Timestamp,
    /// Sender display name at send time.
    pub sender_display_name: String,
    /// Sender image at send time.
    pub sender_image_ref: String,
    /// Users who have seen the message.
    pub seen_by: BTreeSet<UserId>,
}

impl Message {
    /// Decode a message document, taking id and creation time from the
    /// snapshot metadata.
    pub fn from_snapshot(
        room_id: &RoomId,
        snapshot: &DocumentSnapshot,
    ) -> Result<Self, StoreError> {
        let body: MessageBody = decode(&snapshot.fields)?;
        Ok(Self {
            id: MessageId::new(snapshot.id.clone()),
            room_id: room_id.clone(),
            sender_id: body.sender_id,
            text: body.text,
            created_at: snapshot.create_time,
            sender_display_name: body.sender_display_name,
            sender_image_ref: body.sender_image_ref,
            seen_by: body.seen_by,
        })
    }

    /// Whether `user` appears in the seen set.
    pub fn is_seen_by(&self, user: &UserId) -> bool {
        self.seen_by.contains(user)
    }
}
