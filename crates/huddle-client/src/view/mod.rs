//! View models for chat screens.
//!
//! Pure state machines: they consume [`RoomEvent`]s and [`RoomListEvent`]s
//! produced by subscriptions and one-shot operations, and return
//! [`ViewAction`]s for the UI layer to execute. No I/O happens here.

mod list;
mod room;

use huddle_core::ChatError;
pub use list::{RoomListEvent, RoomListView};
pub use room::{ReceiptStatus, RoomEvent, RoomView};

/// Instructions for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    /// Redraw from current state.
    Render,
    /// Scroll the message list to the newest message.
    ScrollToEnd,
    /// Show a modal alert.
    ShowAlert(Alert),
    /// The room no longer includes the viewer; leave the screen.
    Close,
}

/// One-shot operation whose failure is shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Sending a message.
    Send,
    /// Opening a private chat or creating a group.
    CreateRoom,
    /// Editing a group.
    UpdateGroup,
    /// Changing the profile image.
    UpdateProfile,
}

impl Operation {
    /// Alert title for failures of this operation.
    pub fn title(self) -> &'static str {
        match self {
            Self::Send => "Message",
            Self::CreateRoom => "Error",
            Self::UpdateGroup => "Group",
            Self::UpdateProfile => "Profile",
        }
    }
}

/// A user-facing error notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Short heading.
    pub title: String,
    /// Human-readable explanation.
    pub message: String,
}

impl Alert {
    /// Alert describing a failed `operation`.
    pub fn from_error(operation: Operation, error: &ChatError) -> Self {
        let message = match (operation, error) {
            (Operation::CreateRoom, ChatError::StoreUnavailable(_)) => {
                "Failed to create chat room".to_string()
            },
            (_, ChatError::EmptyMessage) => "Message is empty".to_string(),
            (_, other) => other.to_string(),
        };
        Self { title: operation.title().to_string(), message }
    }
}
