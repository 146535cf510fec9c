//! Client-side synchronization for Huddle chat.
//!
//! Every component is generic over a [`DocumentStore`](huddle_core::DocumentStore)
//! and, where it needs time or randomness, an
//! [`Environment`](huddle_core::Environment):
//!
//! - [`RoomLifecycle`]: lazy, idempotent room creation
//! - [`MessageStream`]: live message batches with automatic seen receipts
//! - [`SeenTracker`]: set-union receipts on messages and previews
//! - [`LastMessageProjector`]: denormalized last-message summaries
//! - [`RoomList`]: the viewer's rooms, ordered for display
//! - [`GroupEditor`]: group metadata and membership edits
//! - [`MessageSender`]: the send path tying the above together
//! - [`UserDirectory`]: contacts and profile images
//!
//! [`ChatClient`] bundles them for one signed-in user. The [`view`] module
//! holds pure state machines for the room and room-list screens.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod directory;
mod group;
mod handle;
mod lifecycle;
mod projector;
mod receipts;
mod room_list;
mod sender;
mod stream;
mod system_env;
pub mod view;

pub use client::ChatClient;
pub use config::{ClientConfig, ConfigError};
pub use directory::UserDirectory;
pub use group::{GroupEditor, GroupUpdate, validate_members};
pub use handle::SubscriptionHandle;
pub use lifecycle::{RoomLifecycle, RoomMetadata};
pub use projector::LastMessageProjector;
pub use receipts::SeenTracker;
pub use room_list::{NO_MESSAGE_YET, RoomFeed, RoomList, RoomPreview, UNKNOWN_USER, order_rooms};
pub use sender::{MessageSender, SendReceipt, compose};
pub use stream::{MessageFeed, MessageStream};
pub use system_env::SystemEnv;
