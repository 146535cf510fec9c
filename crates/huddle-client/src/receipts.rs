//! Seen receipts.
//!
//! A receipt is a set-union of the viewer's id into a message's `seenBy`
//! array. Union is idempotent and commutative, so concurrent receipts from
//! different members never lose entries and repeated receipts are harmless.
//! Live feeds still issue each receipt once: `ReceiptQueue` remembers what
//! is in flight and only re-issues receipts that failed.

use std::{collections::HashSet, sync::Arc};

use huddle_core::{
    ChatError, DocumentStore, Message, MessageId, RoomId, UserId,
    store::FieldUpdate,
};
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// Field holding the seen set on message documents.
pub(crate) const SEEN_BY_FIELD: &str = "seenBy";

/// Seen set of the last-message summary on room documents.
const PREVIEW_SEEN_BY_FIELD: &str = "lastMessage.seenBy";

/// Records that a user has observed a message.
#[derive(Clone)]
pub struct SeenTracker<S: DocumentStore> {
    store: S,
    config: Arc<ClientConfig>,
}

impl<S: DocumentStore> SeenTracker<S> {
    /// Tracker writing to `store`.
    pub fn new(store: S, config: Arc<ClientConfig>) -> Self {
        Self { store, config }
    }

    /// Add `viewer` to the seen set of a message.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the message document does not exist
    /// - `StoreUnavailable` on transport failure; safe to retry
    pub async fn mark_seen(
        &self,
        room_id: &RoomId,
        message_id: &MessageId,
        viewer: &UserId,
    ) -> Result<(), ChatError> {
        let update = FieldUpdate::ArrayUnion {
            path: SEEN_BY_FIELD.to_string(),
            values: vec![Value::String(viewer.as_str().to_string())],
        };
        self.store
            .update_fields(&self.config.messages(room_id), message_id.as_str(), vec![update])
            .await?;

        debug!(room_id = %room_id, message_id = %message_id, viewer = %viewer, "marked seen");
        Ok(())
    }

    /// [`mark_seen`](Self::mark_seen), logging failures instead of returning
    /// them. Returns whether the receipt was recorded. A lost receipt is
    /// re-attempted on the next snapshot that still shows the message unseen.
    pub async fn mark_seen_quietly(
        &self,
        room_id: &RoomId,
        message_id: &MessageId,
        viewer: &UserId,
    ) -> bool {
        match self.mark_seen(room_id, message_id, viewer).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    room_id = %room_id,
                    message_id = %message_id,
                    viewer = %viewer,
                    error = %err,
                    "failed to record seen receipt"
                );
                false
            },
        }
    }

    /// Add `viewer` to the seen set of the room's last-message summary, so
    /// list previews stop showing it as unread.
    ///
    /// Only call this after observing the newest message: a message projected
    /// in between would be marked seen as well.
    pub async fn mark_preview_seen(
        &self,
        room_id: &RoomId,
        viewer: &UserId,
    ) -> Result<(), ChatError> {
        let update = FieldUpdate::ArrayUnion {
            path: PREVIEW_SEEN_BY_FIELD.to_string(),
            values: vec![Value::String(viewer.as_str().to_string())],
        };
        self.store.update_fields(&self.config.rooms(), room_id.as_str(), vec![update]).await?;

        debug!(room_id = %room_id, viewer = %viewer, "marked preview seen");
        Ok(())
    }

    /// Fire-and-forget receipts for `unseen` messages on the current runtime,
    /// followed by the preview receipt when `preview_for` names the newest
    /// message. Failures are logged and reported on `lost`.
    pub(crate) fn spawn_receipts(
        &self,
        room_id: RoomId,
        unseen: Vec<MessageId>,
        preview_for: Option<MessageId>,
        viewer: UserId,
        lost: mpsc::UnboundedSender<LostReceipt>,
    ) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            for message_id in unseen {
                if !tracker.mark_seen_quietly(&room_id, &message_id, &viewer).await {
                    let _ = lost.send(LostReceipt::Message(message_id));
                }
            }
            if let Some(newest) = preview_for {
                if let Err(err) = tracker.mark_preview_seen(&room_id, &viewer).await {
                    warn!(
                        room_id = %room_id,
                        viewer = %viewer,
                        error = %err,
                        "failed to record preview receipt"
                    );
                    let _ = lost.send(LostReceipt::Preview(newest));
                }
            }
        })
    }
}

/// A receipt that did not reach the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LostReceipt {
    /// Receipt on a message document.
    Message(MessageId),
    /// Preview receipt issued for this newest message.
    Preview(MessageId),
}

/// Receipt bookkeeping for one viewer in one room.
///
/// Every batch of a live feed shows the messages still unseen, including
/// those whose receipts are in flight. The queue issues a receipt only for
/// messages it has not already sent one for, and the preview receipt once
/// per newest message. Receipts that fail are forgotten, so the next batch
/// still showing the message unseen issues them again.
pub(crate) struct ReceiptQueue<S: DocumentStore> {
    tracker: SeenTracker<S>,
    room_id: RoomId,
    viewer: UserId,
    pending: HashSet<MessageId>,
    preview_for: Option<MessageId>,
    lost_tx: mpsc::UnboundedSender<LostReceipt>,
    lost_rx: mpsc::UnboundedReceiver<LostReceipt>,
}

impl<S: DocumentStore> ReceiptQueue<S> {
    pub(crate) fn new(tracker: SeenTracker<S>, room_id: RoomId, viewer: UserId) -> Self {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        Self {
            tracker,
            room_id,
            viewer,
            pending: HashSet::new(),
            preview_for: None,
            lost_tx,
            lost_rx,
        }
    }

    /// Issue the receipts `messages` calls for. Returns the spawned task, if
    /// any receipt was due.
    pub(crate) fn schedule(&mut self, messages: &[Message]) -> Option<JoinHandle<()>> {
        while let Ok(lost) = self.lost_rx.try_recv() {
            match lost {
                LostReceipt::Message(id) => {
                    self.pending.remove(&id);
                },
                LostReceipt::Preview(id) => {
                    if self.preview_for.as_ref() == Some(&id) {
                        self.preview_for = None;
                    }
                },
            }
        }

        let unseen: HashSet<&MessageId> = messages
            .iter()
            .filter(|message| !message.is_seen_by(&self.viewer))
            .map(|message| &message.id)
            .collect();
        self.pending.retain(|id| unseen.contains(id));

        let due: Vec<MessageId> = messages
            .iter()
            .filter(|message| unseen.contains(&message.id) && !self.pending.contains(&message.id))
            .map(|message| message.id.clone())
            .collect();
        let preview = messages
            .last()
            .filter(|newest| unseen.contains(&newest.id))
            .filter(|newest| self.preview_for.as_ref() != Some(&newest.id))
            .map(|newest| newest.id.clone());

        if due.is_empty() && preview.is_none() {
            return None;
        }

        self.pending.extend(due.iter().cloned());
        if preview.is_some() {
            self.preview_for.clone_from(&preview);
        }
        debug!(
            room_id = %self.room_id,
            viewer = %self.viewer,
            receipts = due.len(),
            preview = preview.is_some(),
            "issuing seen receipts"
        );
        Some(self.tracker.spawn_receipts(
            self.room_id.clone(),
            due,
            preview,
            self.viewer.clone(),
            self.lost_tx.clone(),
        ))
    }
}
