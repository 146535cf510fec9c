//! Send path: ensure the room, append the message, project the preview.

use std::{collections::BTreeSet, sync::Arc};

use huddle_core::{
    ChatError, DocumentStore, Environment, Message, Room, RoomId, User,
    model::MessageBody,
    store::encode,
};
use tracing::{info, warn};

use crate::{
    config::ClientConfig,
    lifecycle::{RoomLifecycle, RoomMetadata},
    projector::LastMessageProjector,
};

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// The stored message, with its store-assigned id and creation time.
    pub message: Message,
    /// False if the message was stored but the room preview still shows an
    /// older message.
    pub preview_updated: bool,
}

/// Trim `text`; reject it if nothing is left.
pub fn compose(text: &str) -> Result<&str, ChatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    Ok(trimmed)
}

/// Appends messages to rooms.
#[derive(Clone)]
pub struct MessageSender<S: DocumentStore, E: Environment> {
    store: S,
    config: Arc<ClientConfig>,
    lifecycle: RoomLifecycle<S, E>,
    projector: LastMessageProjector<S>,
}

impl<S: DocumentStore, E: Environment> MessageSender<S, E> {
    /// Sender writing to `store`.
    pub fn new(store: S, env: E, config: Arc<ClientConfig>) -> Self {
        Self {
            lifecycle: RoomLifecycle::new(store.clone(), env, Arc::clone(&config)),
            projector: LastMessageProjector::new(store.clone(), Arc::clone(&config)),
            store,
            config,
        }
    }

    /// Send `text` from `sender`, creating the room from `metadata` if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// - `EmptyMessage` if `text` is blank; nothing is written
    /// - `MembershipViolation` if `sender` is not a member of the room
    /// - any error of [`RoomLifecycle::ensure_room`]
    /// - `StoreUnavailable` if the append fails. A failed preview update
    ///   does not fail the send; see [`SendReceipt::preview_updated`]
    pub async fn send(
        &self,
        room_id: &RoomId,
        metadata: &RoomMetadata,
        sender: &User,
        text: &str,
    ) -> Result<SendReceipt, ChatError> {
        let text = compose(text)?;
        if !metadata.members.contains(&sender.user_id) {
            return Err(ChatError::MembershipViolation(format!(
                "{} is not a member of {room_id}",
                sender.user_id
            )));
        }

        let room = self.lifecycle.ensure_room(room_id, metadata).await?;
        self.append(&room, sender, text).await
    }

    /// Send `text` from `sender` to a room that already exists.
    ///
    /// # Errors
    ///
    /// - `EmptyMessage` if `text` is blank
    /// - `RoomNotFound` if the room does not exist
    /// - `MembershipViolation` if `sender` is not a current member
    pub async fn send_to_room(
        &self,
        room_id: &RoomId,
        sender: &User,
        text: &str,
    ) -> Result<SendReceipt, ChatError> {
        let text = compose(text)?;
        let snapshot = self
            .store
            .get_document(&self.config.rooms(), room_id.as_str())
            .await?
            .ok_or_else(|| ChatError::RoomNotFound(room_id.clone()))?;
        let room = Room::from_snapshot(&snapshot)?;
        self.append(&room, sender, text).await
    }

    async fn append(
        &self,
        room: &Room,
        sender: &User,
        text: &str,
    ) -> Result<SendReceipt, ChatError> {
        if !room.is_member(&sender.user_id) {
            return Err(ChatError::MembershipViolation(format!(
                "{} is not a member of {}",
                sender.user_id, room.room_id
            )));
        }

        let body = MessageBody {
            sender_id: sender.user_id.clone(),
            text: text.to_string(),
            sender_display_name: sender.username.clone(),
            sender_image_ref: sender.profile_image_ref.clone(),
            seen_by: BTreeSet::from([sender.user_id.clone()]),
        };
        let snapshot =
            self.store.add_document(&self.config.messages(&room.room_id), encode(&body)?).await?;
        let message = Message::from_snapshot(&room.room_id, &snapshot)?;

        let projected = self.projector.project_last_message(&room.room_id, &message).await;
        let preview_updated = match projected {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    room_id = %room.room_id,
                    message_id = %message.id,
                    error = %err,
                    "message stored but preview not updated"
                );
                false
            },
        };

        info!(
            room_id = %room.room_id,
            message_id = %message.id,
            sender = %sender.user_id,
            "message sent"
        );
        Ok(SendReceipt { message, preview_updated })
    }
}

#[cfg(test)]
mod tests {
    use huddle_core::UserId;
    use huddle_store::{ChaosScope, ChaoticStore, MemoryStore, SimEnv};

    use super::*;

    fn profile(raw: &str, name: &str) -> User {
        User {
            user_id: UserId::new(raw).unwrap(),
            username: name.into(),
            profile_image_ref: String::new(),
        }
    }

    fn sender() -> (MemoryStore, MessageSender<MemoryStore, SimEnv>) {
        let env = SimEnv::with_seed(4);
        let store = MemoryStore::new(env.clone());
        (store.clone(), MessageSender::new(store, env, Arc::new(ClientConfig::default())))
    }

    #[test]
    fn compose_trims_and_rejects_blank() {
        assert_eq!(compose("  hi \n").unwrap(), "hi");
        assert!(matches!(compose(" \t\n"), Err(ChatError::EmptyMessage)));
    }

    #[tokio::test]
    async fn first_send_creates_room_and_preview() {
        let (store, sender) = sender();
        let ann = profile("u1", "Ann");
        let bob = profile("u2", "Bob");
        let room_id = RoomId::group("u1_u2").unwrap();

        let metadata = RoomMetadata::private(&ann, &bob);
        let receipt = sender.send(&room_id, &metadata, &ann, " hello ").await.unwrap();

        assert!(receipt.preview_updated);
        assert_eq!(receipt.message.text, "hello");
        assert_eq!(receipt.message.sender_display_name, "Ann");

        let config = ClientConfig::default();
        let snapshot = store.peek(&config.rooms(), room_id.as_str()).unwrap();
        let room = Room::from_snapshot(&snapshot).unwrap();
        assert_eq!(room.last_message.text, "hello");
        assert_eq!(room.last_message.created_at, receipt.message.created_at);
        assert_eq!(store.document_count(&config.messages(&room_id)), 1);
    }

    #[tokio::test]
    async fn blank_message_writes_nothing() {
        let (store, sender) = sender();
        let ann = profile("u1", "Ann");
        let bob = profile("u2", "Bob");
        let room_id = RoomId::group("u1_u2").unwrap();

        let result = sender.send(&room_id, &RoomMetadata::private(&ann, &bob), &ann, "   ").await;
        assert!(matches!(result, Err(ChatError::EmptyMessage)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn non_member_cannot_send() {
        let (_store, sender) = sender();
        let ann = profile("u1", "Ann");
        let bob = profile("u2", "Bob");
        let eve = profile("u3", "Eve");
        let room_id = RoomId::group("u1_u2").unwrap();
        let metadata = RoomMetadata::private(&ann, &bob);

        let result = sender.send(&room_id, &metadata, &eve, "hi").await;
        assert!(matches!(result, Err(ChatError::MembershipViolation(_))));

        sender.send(&room_id, &metadata, &ann, "hi").await.unwrap();
        let result = sender.send_to_room(&room_id, &eve, "hi").await;
        assert!(matches!(result, Err(ChatError::MembershipViolation(_))));
    }

    #[tokio::test]
    async fn send_to_missing_room_fails() {
        let (_store, sender) = sender();
        let ghost = RoomId::group("ghost").unwrap();
        let result = sender.send_to_room(&ghost, &profile("u1", "Ann"), "hi").await;
        assert!(matches!(result, Err(ChatError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn failed_preview_does_not_fail_send() {
        let env = SimEnv::with_seed(4);
        let memory = MemoryStore::new(env.clone());
        let store = ChaoticStore::with_seed(memory.clone(), 1.0, ChaosScope::UpdatesOnly, 7);
        let sender = MessageSender::new(store, env, Arc::new(ClientConfig::default()));
        let ann = profile("u1", "Ann");
        let bob = profile("u2", "Bob");
        let room_id = RoomId::group("u1_u2").unwrap();

        let metadata = RoomMetadata::private(&ann, &bob);
        let receipt = sender.send(&room_id, &metadata, &ann, "hi").await.unwrap();

        assert!(!receipt.preview_updated);
        let config = ClientConfig::default();
        assert_eq!(memory.document_count(&config.messages(&room_id)), 1);
        let snapshot = memory.peek(&config.rooms(), room_id.as_str()).unwrap();
        let room = Room::from_snapshot(&snapshot).unwrap();
        assert!(room.last_message.is_sentinel());
    }
}
