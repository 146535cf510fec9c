//! Room lifecycle: lazy, idempotent room creation.
//!
//! Rooms are created on first use. Both participants of a private chat may
//! open it at the same moment; since the id is derived from the member pair
//! and the write is a whole-document set, racing creators converge on a
//! single document.

use std::{collections::BTreeSet, sync::Arc};

use huddle_core::{
    ChatError, DocumentStore, Environment, MessageSummary, Room, RoomId, RoomKind, User, UserId,
    resolve_private_room_id,
    store::encode,
};
use tracing::{debug, info};
use uuid::Builder;

use crate::config::ClientConfig;

/// What a room should look like if it has to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMetadata {
    /// Private or group.
    pub kind: RoomKind,
    /// Initial members, including the creator.
    pub members: BTreeSet<UserId>,
    /// Room title.
    pub display_name: String,
    /// Room image.
    pub image_ref: String,
    /// Creator.
    pub created_by: UserId,
}

impl RoomMetadata {
    /// Metadata for a private room opened by `viewer` with `peer`. The title
    /// is the peer's name as the opener sees it.
    pub fn private(viewer: &User, peer: &User) -> Self {
        Self {
            kind: RoomKind::Private,
            members: BTreeSet::from([viewer.user_id.clone(), peer.user_id.clone()]),
            display_name: peer.username.clone(),
            image_ref: peer.profile_image_ref.clone(),
            created_by: viewer.user_id.clone(),
        }
    }

    /// Metadata for a group created by `creator` with the selected users.
    pub fn group(
        creator: &UserId,
        name: &str,
        image_ref: &str,
        selected: impl IntoIterator<Item = UserId>,
    ) -> Self {
        let mut members: BTreeSet<UserId> = selected.into_iter().collect();
        members.insert(creator.clone());
        Self {
            kind: RoomKind::Group,
            members,
            display_name: name.trim().to_string(),
            image_ref: image_ref.to_string(),
            created_by: creator.clone(),
        }
    }

    /// Check that this metadata may be written as `room_id`.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentity` if a private room id does not match its members
    /// - `InvalidGroup` for an unnamed group
    /// - `MembershipViolation` if the creator is not a member, or for a
    ///   group of one
    pub fn validate(&self, room_id: &RoomId) -> Result<(), ChatError> {
        if !self.members.contains(&self.created_by) {
            return Err(ChatError::MembershipViolation(format!(
                "creator {} is not a member of {room_id}",
                self.created_by
            )));
        }

        match self.kind {
            RoomKind::Private => {
                let mut members = self.members.iter();
                let (Some(a), Some(b), None) = (members.next(), members.next(), members.next())
                else {
                    return Err(ChatError::InvalidIdentity(format!(
                        "private room {room_id} needs exactly two members"
                    )));
                };
                if resolve_private_room_id(a, b)? != *room_id {
                    return Err(ChatError::InvalidIdentity(format!(
                        "room id {room_id} does not match its members"
                    )));
                }
            },
            RoomKind::Group => {
                if self.display_name.trim().is_empty() {
                    return Err(ChatError::InvalidGroup("group name is empty".into()));
                }
                if self.members.len() < 2 {
                    return Err(ChatError::MembershipViolation(format!(
                        "group {room_id} has no member besides its creator"
                    )));
                }
            },
        }
        Ok(())
    }
}

/// Creates rooms on demand.
#[derive(Clone)]
pub struct RoomLifecycle<S: DocumentStore, E: Environment> {
    store: S,
    env: E,
    config: Arc<ClientConfig>,
}

impl<S: DocumentStore, E: Environment> RoomLifecycle<S, E> {
    /// Lifecycle writing to `store`.
    pub fn new(store: S, env: E, config: Arc<ClientConfig>) -> Self {
        Self { store, env, config }
    }

    /// Make sure room `room_id` exists, creating it from `metadata` if absent.
    ///
    /// Returns the stored room: the existing document untouched, or the one
    /// just written with a sentinel last message. Concurrent calls for the
    /// same id leave exactly one document; when two creators race, the last
    /// whole-document write wins and both bodies are equivalent apart from
    /// the title and creation time.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentity` / `InvalidGroup` / `MembershipViolation` from
    ///   [`RoomMetadata::validate`]; nothing is written
    /// - `StoreUnavailable` on transport failure; safe to retry
    pub async fn ensure_room(
        &self,
        room_id: &RoomId,
        metadata: &RoomMetadata,
    ) -> Result<Room, ChatError> {
        metadata.validate(room_id)?;

        let rooms = self.config.rooms();
        if let Some(snapshot) = self.store.get_document(&rooms, room_id.as_str()).await? {
            debug!(room_id = %room_id, "room already exists");
            return Ok(Room::from_snapshot(&snapshot)?);
        }

        let now = self.env.now();
        let room = Room {
            room_id: room_id.clone(),
            kind: metadata.kind,
            members: metadata.members.clone(),
            display_name: metadata.display_name.clone(),
            image_ref: metadata.image_ref.clone(),
            created_by: metadata.created_by.clone(),
            created_at: now,
            last_message: MessageSummary::sentinel(now),
        };
        self.store.set_document(&rooms, room_id.as_str(), encode(&room)?).await?;

        info!(
            room_id = %room_id,
            kind = ?room.kind,
            members = room.members.len(),
            "room created"
        );
        Ok(room)
    }

    /// Resolve and ensure the private room between `viewer` and `peer`.
    pub async fn open_private(&self, viewer: &User, peer: &User) -> Result<RoomId, ChatError> {
        let room_id = resolve_private_room_id(&viewer.user_id, &peer.user_id)?;
        self.ensure_room(&room_id, &RoomMetadata::private(viewer, peer)).await?;
        Ok(room_id)
    }

    /// Create a new group room with a fresh random id.
    ///
    /// Members are `selected` plus the creator.
    ///
    /// # Errors
    ///
    /// - `InvalidGroup` if `name` is blank
    /// - `MembershipViolation` if nobody besides the creator is selected
    pub async fn create_group(
        &self,
        creator: &UserId,
        name: &str,
        image_ref: &str,
        selected: impl IntoIterator<Item = UserId>,
    ) -> Result<RoomId, ChatError> {
        let metadata = RoomMetadata::group(creator, name, image_ref, selected);
        let room_id = RoomId::group(self.generate_group_id().to_string())?;
        self.ensure_room(&room_id, &metadata).await?;
        Ok(room_id)
    }

    fn generate_group_id(&self) -> uuid::Uuid {
        Builder::from_random_bytes(self.env.random_u128().to_be_bytes()).into_uuid()
    }
}
