//! Room list aggregation.
//!
//! One live query over the room collection selects the viewer's rooms. Each
//! batch is re-sorted locally: rooms nobody has written in yet come first,
//! newest first, followed by the rest by latest message, newest first.

use std::{cmp::Ordering, sync::Arc};

use huddle_core::{
    ChatError, DocumentStore, Room, RoomId, RoomKind, Timestamp, User, UserId,
    store::{Direction, DocumentSnapshot, Filter, OrderKey, Query, Subscription},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::ClientConfig,
    handle::{SubscriptionHandle, still_active},
};

/// Preview text for a room without messages.
pub const NO_MESSAGE_YET: &str = "No message yet";

/// Title for a private room whose peer profile is unknown.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Subscribes to the rooms a viewer belongs to.
#[derive(Clone)]
pub struct RoomList<S: DocumentStore> {
    store: S,
    config: Arc<ClientConfig>,
}

impl<S: DocumentStore> RoomList<S> {
    /// Room list reading from `store`.
    pub fn new(store: S, config: Arc<ClientConfig>) -> Self {
        Self { store, config }
    }

    /// Open a pull-style feed of `viewer`'s rooms.
    pub async fn open(&self, viewer: &UserId) -> Result<RoomFeed, ChatError> {
        let query = Query::new()
            .filter(Filter::ArrayContains {
                path: "members".into(),
                value: Value::String(viewer.as_str().to_string()),
            })
            .order_by(OrderKey::Field("lastMessage.createdAt".into()), Direction::Descending);
        let subscription = self.store.subscribe_query(&self.config.rooms(), query).await?;

        debug!(viewer = %viewer, "room feed opened");
        Ok(RoomFeed { viewer: viewer.clone(), subscription })
    }

    /// Deliver every batch to `on_batch` until the handle is disposed.
    pub async fn subscribe_rooms<F>(
        &self,
        viewer: &UserId,
        mut on_batch: F,
    ) -> Result<SubscriptionHandle, ChatError>
    where
        F: FnMut(Vec<Room>) + Send + 'static,
    {
        let mut feed = self.open(viewer).await?;
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

    /// Follow a single room document, e.g. for a chat header showing the
    /// current group name and members. `None` while the room does not exist.
    pub async fn watch_room<F>(
        &self,
        room_id: &RoomId,
        mut on_change: F,
    ) -> Result<SubscriptionHandle, ChatError>
    where
        F: FnMut(Option<Room>) + Send + 'static,
    {
        let mut subscription =
            self.store.subscribe_document(&self.config.rooms(), room_id.as_str()).await?;
        let room_id = room_id.clone();
        Ok(SubscriptionHandle::spawn(move |active| async move {
            while let Some(snapshot) = subscription.next().await {
                if !still_active(&active) {
                    break;
                }
                match snapshot.as_ref().map(Room::from_snapshot).transpose() {
                    Ok(room) => on_change(room),
                    Err(err) => warn!(room_id = %room_id, error = %err, "skipping malformed room"),
                }
            }
            subscription.dispose();
        }))
    }
}

/// Pull-style room list subscription.
#[derive(Debug)]
pub struct RoomFeed {
    viewer: UserId,
    subscription: Subscription<Vec<DocumentSnapshot>>,
}

impl RoomFeed {
    /// Next full, ordered list of the viewer's rooms. `None` after disposal
    /// or when the store ends the stream.
    pub async fn next(&mut self) -> Option<Vec<Room>> {
        let snapshots = self.subscription.next().await?;
        let mut rooms: Vec<Room> = snapshots
            .iter()
            .filter_map(|snapshot| match Room::from_snapshot(snapshot) {
                Ok(room) => Some(room),
                Err(err) => {
                    warn!(room_id = %snapshot.id, error = %err, "skipping malformed room");
                    None
                },
            })
            .filter(|room| room.is_member(&self.viewer))
            .collect();
        order_rooms(&mut rooms);
        Some(rooms)
    }

    /// Stop delivery. Idempotent.
    pub fn dispose(&mut self) {
        if !self.subscription.is_disposed() {
            self.subscription.dispose();
            debug!(viewer = %self.viewer, "room feed disposed");
        }
    }
}

/// Sort rooms for display: message-less rooms first by creation time, then
/// by latest message, both newest first. Ties fall back to room id.
pub fn order_rooms(rooms: &mut [Room]) {
    rooms.sort_by(|a, b| {
        match (a.last_message.is_sentinel(), b.last_message.is_sentinel()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => b.created_at.cmp(&a.created_at),
            (false, false) => b.last_message.created_at.cmp(&a.last_message.created_at),
        }
        .then_with(|| a.room_id.cmp(&b.room_id))
    });
}

/// A room as shown in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPreview {
    /// Room id.
    pub room_id: RoomId,
    /// Private or group.
    pub kind: RoomKind,
    /// Group name, or the other participant's name.
    pub title: String,
    /// Room image, or the other participant's image.
    pub image_ref: String,
    /// Last message text, or [`NO_MESSAGE_YET`].
    pub preview: String,
    /// Sender name of the last message, empty when there is none.
    pub sender_display_name: String,
    /// Time of the last message, or room creation.
    pub timestamp: Timestamp,
    /// Last message came from someone else and the viewer has not seen it.
    pub unread: bool,
    /// Other participant of a private room.
    pub peer: Option<UserId>,
}

impl RoomPreview {
    /// Preview of `room` for `viewer`.
    ///
    /// Private rooms store the title chosen by their creator, which is the
    /// peer's name only from the creator's side. Pass the peer's profile when
    /// known; otherwise the creator sees the stored title and the other
    /// participant sees [`UNKNOWN_USER`].
    pub fn new(room: &Room, viewer: &UserId, peer_profile: Option<&User>) -> Self {
        let peer = room.peer_of(viewer).cloned();
        let (title, image_ref) = match (room.kind, peer_profile) {
            (RoomKind::Group, _) => (room.display_name.clone(), room.image_ref.clone()),
            (RoomKind::Private, Some(profile)) if peer.as_ref() == Some(&profile.user_id) => {
                (profile.username.clone(), profile.profile_image_ref.clone())
            },
            (RoomKind::Private, _) if room.created_by == *viewer => {
                (room.display_name.clone(), room.image_ref.clone())
            },
            (RoomKind::Private, _) => (UNKNOWN_USER.to_string(), String::new()),
        };

        let last = &room.last_message;
        let preview =
            if last.is_sentinel() { NO_MESSAGE_YET.to_string() } else { last.text.clone() };
        let unread = !last.is_sentinel()
            && last.sender_id.as_ref() != Some(viewer)
            && !last.seen_by.contains(viewer);

        Self {
            room_id: room.room_id.clone(),
            kind: room.kind,
            title,
            image_ref,
            preview,
            sender_display_name: last.sender_display_name.clone(),
            timestamp: last.created_at,
            unread,
            peer,
        }
    }
}
