//! Chat room screen state.

use huddle_core::{ChatError, Message, Room, RoomId, UserId};

use super::{Alert, Operation, ViewAction};

/// Delivery state of the viewer's own message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Stored; not yet seen by every other member.
    Sent,
    /// Seen by every other current member.
    Seen,
}

/// Inputs to [`RoomView`].
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A full message batch from the stream.
    MessagesChanged(Vec<Message>),
    /// The room document changed, or disappeared (`None`).
    RoomChanged(Option<Room>),
    /// A one-shot operation failed.
    OperationFailed {
        /// What was attempted.
        operation: Operation,
        /// Why it failed.
        error: ChatError,
    },
    /// The alert was acknowledged.
    AlertDismissed,
}

/// State of one open chat room.
#[derive(Debug, Clone)]
pub struct RoomView {
    viewer: UserId,
    room_id: RoomId,
    room: Option<Room>,
    messages: Vec<Message>,
    alert: Option<Alert>,
}

impl RoomView {
    /// Empty view of `room_id` for `viewer`.
    pub fn new(viewer: UserId, room_id: RoomId) -> Self {
        Self { viewer, room_id, room: None, messages: Vec::new(), alert: None }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: RoomEvent) -> Vec<ViewAction> {
        match event {
            RoomEvent::MessagesChanged(batch) => {
                let grew = batch.len() > self.messages.len();
                self.messages = batch;
                if grew {
                    vec![ViewAction::Render, ViewAction::ScrollToEnd]
                } else {
                    vec![ViewAction::Render]
                }
            },
            RoomEvent::RoomChanged(room) => {
                let removed = room.as_ref().is_some_and(|room| !room.is_member(&self.viewer));
                self.room = room;
                if removed { vec![ViewAction::Close] } else { vec![ViewAction::Render] }
            },
            RoomEvent::OperationFailed { operation, error } => {
                let alert = Alert::from_error(operation, &error);
                self.alert = Some(alert.clone());
                vec![ViewAction::ShowAlert(alert), ViewAction::Render]
            },
            RoomEvent::AlertDismissed => {
                self.alert = None;
                vec![ViewAction::Render]
            },
        }
    }

    /// Room id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Latest room document, once observed.
    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Pending alert.
    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    /// Whether the viewer sent `message`.
    pub fn is_mine(&self, message: &Message) -> bool {
        message.sender_id == self.viewer
    }

    /// Receipt state of `message`: `Seen` once every other current member
    /// has seen it. `Sent` while the room document is unknown.
    pub fn receipt_status(&self, message: &Message) -> ReceiptStatus {
        let Some(room) = &self.room else {
            return ReceiptStatus::Sent;
        };
        let everyone = room
            .members
            .iter()
            .filter(|member| **member != message.sender_id)
            .all(|member| message.is_seen_by(member));
        if everyone { ReceiptStatus::Seen } else { ReceiptStatus::Sent }
    }
}
