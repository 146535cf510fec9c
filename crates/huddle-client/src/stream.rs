//! Live message stream for one room.
//!
//! Each batch is the complete, ascending-by-creation list of the room's
//! messages. Observing a batch marks every message the viewer has not yet
//! seen; receipts are issued in the background and never block delivery.
//! Each receipt is issued once per feed and re-issued only if it failed.

use std::sync::Arc;

use huddle_core::{
    ChatError, DocumentStore, Message, RoomId, UserId,
    store::{Direction, DocumentSnapshot, OrderKey, Query, Subscription},
};
use tracing::{debug, warn};

use crate::{
    config::ClientConfig,
    handle::{SubscriptionHandle, still_active},
    receipts::{ReceiptQueue, SeenTracker},
};

/// Opens message subscriptions on behalf of one viewer.
#[derive(Clone)]
pub struct MessageStream<S: DocumentStore> {
    store: S,
    config: Arc<ClientConfig>,
    viewer: UserId,
    tracker: SeenTracker<S>,
}

impl<S: DocumentStore> MessageStream<S> {
    /// Stream for `viewer`.
    pub fn new(store: S, config: Arc<ClientConfig>, viewer: UserId) -> Self {
        let tracker = SeenTracker::new(store.clone(), Arc::clone(&config));
        Self { store, config, viewer, tracker }
    }

    /// Open a pull-style feed of `room_id`'s messages.
    ///
    /// The room document need not exist yet: the feed yields an empty batch
    /// and picks up messages once the first one is sent.
    pub async fn open(&self, room_id: &RoomId) -> Result<MessageFeed<S>, ChatError> {
        let query = Query::new().order_by(OrderKey::CreateTime, Direction::Ascending);
        let subscription = self.store.subscribe_query(&self.config.messages(room_id), query).await?;

        debug!(room_id = %room_id, viewer = %self.viewer, "message feed opened");
        Ok(MessageFeed {
            room_id: room_id.clone(),
            viewer: self.viewer.clone(),
            receipts: ReceiptQueue::new(self.tracker.clone(), room_id.clone(), self.viewer.clone()),
            subscription,
        })
    }

    /// Deliver every batch to `on_batch` until the handle is disposed.
    pub async fn subscribe<F>(
        &self,
        room_id: &RoomId,
        mut on_batch: F,
    ) -> Result<SubscriptionHandle, ChatError>
    where
        F: FnMut(Vec<Message>) + Send + 'static,
    {
        let mut feed = self.open(room_id).await?;
        Ok(SubscriptionHandle::spawn(move |active| async move {
            while let Some(batch) = feed.next().await {
                if !still_active(&active) {
                    break;
                }
                on_batch(batch);
            }
            feed.dispose();
        }))
    }
}

/// Pull-style message subscription.
pub struct MessageFeed<S: DocumentStore> {
    room_id: RoomId,
    viewer: UserId,
    receipts: ReceiptQueue<S>,
    subscription: Subscription<Vec<DocumentSnapshot>>,
}

impl<S: DocumentStore> MessageFeed<S> {
    /// Next full batch, oldest first. `None` after disposal or when the store
    /// ends the stream.
    ///
    /// Schedules a seen receipt for every message in the batch the viewer has
    /// not seen and no receipt is in flight for, plus one for the room
    /// preview when the newest message is unseen. Receipts run concurrently
    /// with later batches; a failed receipt is logged and retried when a
    /// later batch still shows the message unseen.
    pub async fn next(&mut self) -> Option<Vec<Message>> {
        let snapshots = self.subscription.next().await?;
        let messages = decode_messages(&self.room_id, &snapshots);
        self.receipts.schedule(&messages);
        Some(messages)
    }

    /// Room this feed follows.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Stop delivery. Idempotent.
    pub fn dispose(&mut self) {
        if !self.subscription.is_disposed() {
            self.subscription.dispose();
            debug!(room_id = %self.room_id, viewer = %self.viewer, "message feed disposed");
        }
    }
}

/// Decode a batch, skipping documents that do not parse as messages.
fn decode_messages(room_id: &RoomId, snapshots: &[DocumentSnapshot]) -> Vec<Message> {
    snapshots
        .iter()
        .filter_map(|snapshot| match Message::from_snapshot(room_id, snapshot) {
            Ok(message) => Some(message),
            Err(err) => {
                warn!(
                    room_id = %room_id,
                    message_id = %snapshot.id,
                    error = %err,
                    "skipping malformed message"
                );
                None
            },
        })
        .collect()
}
