//! Group membership editing.

use std::{collections::BTreeSet, sync::Arc};

use huddle_core::{
    ChatError, DocumentStore, Room, RoomId, RoomKind, UserId,
    store::FieldUpdate,
};
use tracing::info;

use crate::config::ClientConfig;

/// Partial edit of a group room. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    /// New group name.
    pub display_name: Option<String>,
    /// New group image.
    pub image_ref: Option<String>,
    /// Complete new member set.
    pub members: Option<BTreeSet<UserId>>,
}

impl GroupUpdate {
    /// Rename.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Change the image.
    #[must_use]
    pub fn image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Replace the member set.
    #[must_use]
    pub fn members(mut self, members: impl IntoIterator<Item = UserId>) -> Self {
        self.members = Some(members.into_iter().collect());
        self
    }

    /// True if applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.image_ref.is_none() && self.members.is_none()
    }
}

/// Edits group metadata and membership.
///
/// Removed members lose the room from their list on the next snapshot; the
/// messages they sent stay in the room.
#[derive(Clone)]
pub struct GroupEditor<S: DocumentStore> {
    store: S,
    config: Arc<ClientConfig>,
}

impl<S: DocumentStore> GroupEditor<S> {
    /// Editor writing to `store`.
    pub fn new(store: S, config: Arc<ClientConfig>) -> Self {
        Self { store, config }
    }

    /// Apply `update` to group `room_id` on behalf of `actor`, as a single
    /// partial write of the changed fields.
    ///
    /// # Errors
    ///
    /// - `RoomNotFound` if the room does not exist
    /// - `MembershipViolation` if the room is private, the actor is not a
    ///   member, or the new member set drops the actor or has fewer than two
    ///   members
    /// - `InvalidGroup` if the new name is blank
    pub async fn update_group(
        &self,
        actor: &UserId,
        room_id: &RoomId,
        update: GroupUpdate,
    ) -> Result<(), ChatError> {
        if update.is_empty() {
            return Ok(());
        }
        if let Some(members) = &update.members {
            validate_members(actor, members)?;
        }
        if update.display_name.as_ref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ChatError::InvalidGroup("group name is empty".into()));
        }

        self.load_editable(actor, room_id).await?;

        let mut writes = Vec::new();
        if let Some(name) = &update.display_name {
            writes.push(FieldUpdate::set("displayName", name.trim())?);
        }
        if let Some(image_ref) = &update.image_ref {
            writes.push(FieldUpdate::set("imageRef", image_ref)?);
        }
        if let Some(members) = &update.members {
            writes.push(FieldUpdate::set("members", members)?);
        }
        self.store.update_fields(&self.config.rooms(), room_id.as_str(), writes).await?;

        info!(
            room_id = %room_id,
            actor = %actor,
            renamed = update.display_name.is_some(),
            members = update.members.as_ref().map(BTreeSet::len),
            "group updated"
        );
        Ok(())
    }

    /// Add `new_members` to the group.
    pub async fn add_members(
        &self,
        actor: &UserId,
        room_id: &RoomId,
        new_members: impl IntoIterator<Item = UserId>,
    ) -> Result<(), ChatError> {
        let room = self.load_editable(actor, room_id).await?;
        let mut members = room.members;
        members.extend(new_members);
        self.update_group(actor, room_id, GroupUpdate::default().members(members)).await
    }

    /// Remove `member` from the group. The actor cannot remove themselves.
    pub async fn remove_member(
        &self,
        actor: &UserId,
        room_id: &RoomId,
        member: &UserId,
    ) -> Result<(), ChatError> {
        if member == actor {
            return Err(ChatError::MembershipViolation(format!(
                "{actor} cannot remove themselves from {room_id}"
            )));
        }
        let room = self.load_editable(actor, room_id).await?;
        let mut members = room.members;
        if !members.remove(member) {
            return Ok(());
        }
        self.update_group(actor, room_id, GroupUpdate::default().members(members)).await
    }

    async fn load_editable(&self, actor: &UserId, room_id: &RoomId) -> Result<Room, ChatError> {
        let snapshot = self
            .store
            .get_document(&self.config.rooms(), room_id.as_str())
            .await?
            .ok_or_else(|| ChatError::RoomNotFound(room_id.clone()))?;
        let room = Room::from_snapshot(&snapshot)?;

        if room.kind != RoomKind::Group {
            return Err(ChatError::MembershipViolation(format!("{room_id} is not a group")));
        }
        if !room.is_member(actor) {
            return Err(ChatError::MembershipViolation(format!(
                "{actor} is not a member of {room_id}"
            )));
        }
        Ok(room)
    }
}

/// A group member set must keep the actor and at least one other member.
pub fn validate_members(actor: &UserId, members: &BTreeSet<UserId>) -> Result<(), ChatError> {
    if !members.contains(actor) {
        return Err(ChatError::MembershipViolation(format!("member set must keep {actor}")));
    }
    if members.len() < 2 {
        return Err(ChatError::MembershipViolation("a group needs at least two members".into()));
    }
    Ok(())
}
