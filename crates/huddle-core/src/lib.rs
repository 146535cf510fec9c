//! Huddle core
//!
//! Shared vocabulary for the Huddle chat synchronization core: identifiers,
//! the persisted data model, and the contracts of the external collaborators
//! (document store, identity provider, environment).
//!
//! # Components
//!
//! - [`ids`]: user, room and message identifiers plus the canonical private
//!   room resolver
//! - [`model`]: `User`, `Room`, `Message` and the denormalized
//!   `MessageSummary`
//! - [`store`]: vendor-agnostic realtime document store contract
//! - [`identity`]: authentication/session contract
//! - [`env`]: clock and randomness abstraction for deterministic tests
//!
//! Nothing in this crate performs I/O. Implementations of the contracts live
//! in `huddle-store` (in-memory, simulation) and `huddle-client` (system
//! environment).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod identity;
pub mod ids;
pub mod model;
pub mod store;

pub use env::Environment;
pub use error::ChatError;
pub use identity::{AuthError, IdentityProvider, SignUpProfile};
pub use ids::{MessageId, ROOM_ID_SEPARATOR, RoomId, UserId, resolve_private_room_id};
pub use model::{Message, MessageSummary, Room, RoomKind, Timestamp, User};
pub use store::{DocumentStore, StoreError};
