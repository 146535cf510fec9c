//! Denormalizes the latest message onto its room for list previews.

use std::sync::Arc;

use huddle_core::{
    ChatError, DocumentStore, Message, MessageSummary, RoomId,
    store::FieldUpdate,
};
use tracing::debug;

use crate::config::ClientConfig;

/// Field holding the summary on room documents.
pub(crate) const LAST_MESSAGE_FIELD: &str = "lastMessage";

/// Writes `lastMessage` on room documents.
///
/// Projections are last-writer-wins: when two members send at nearly the
/// same time the stored summary may briefly describe the earlier message,
/// and is corrected by the next send.
#[derive(Clone)]
pub struct LastMessageProjector<S: DocumentStore> {
    store: S,
    config: Arc<ClientConfig>,
}

impl<S: DocumentStore> LastMessageProjector<S> {
    /// Projector writing to `store`.
    pub fn new(store: S, config: Arc<ClientConfig>) -> Self {
        Self { store, config }
    }

    /// Replace the room's summary with one describing `message`, seen only by
    /// its sender. Returns the summary written.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the room document does not exist
    /// - `StoreUnavailable` on transport failure; the message itself is
    ///   unaffected
    pub async fn project_last_message(
        &self,
        room_id: &RoomId,
        message: &Message,
    ) -> Result<MessageSummary, ChatError> {
        let summary = MessageSummary::of(message);
        let update = FieldUpdate::set(LAST_MESSAGE_FIELD, &summary)?;
        self.store.update_fields(&self.config.rooms(), room_id.as_str(), vec![update]).await?;

        debug!(room_id = %room_id, message_id = %message.id, "last message projected");
        Ok(summary)
    }
}
