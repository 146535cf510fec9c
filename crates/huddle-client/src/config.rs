//! Client configuration.
//!
//! Collection names of the persisted layout. Store connection credentials are
//! the store implementation's concern and never pass through here.

use huddle_core::{RoomId, store::CollectionPath};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input is not valid JSON for this config.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A collection name is empty or contains a path separator.
    #[error("invalid collection name for {field}: {value:?}")]
    InvalidCollection {
        /// Offending config field
        field: &'static str,
        /// Offending value
        value: String,
    },
}

/// Persisted layout: `{rooms}/{roomId}`, `{rooms}/{roomId}/{messages}/{id}`,
/// `{users}/{userId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Top-level room collection.
    pub rooms_collection: String,
    /// Message sub-collection under each room.
    pub messages_collection: String,
    /// Top-level user profile collection.
    pub users_collection: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rooms_collection: "rooms".to_string(),
            messages_collection: "messages".to_string(),
            users_collection: "users".to_string(),
        }
    }
}

impl ClientConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject empty names and names containing `/`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("rooms_collection", &self.rooms_collection),
            ("messages_collection", &self.messages_collection),
            ("users_collection", &self.users_collection),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(ConfigError::InvalidCollection { field, value: value.clone() });
            }
        }
        Ok(())
    }

    /// Room collection path.
    pub fn rooms(&self) -> CollectionPath {
        CollectionPath::root(self.rooms_collection.as_str())
    }

    /// Message sub-collection of `room_id`.
    pub fn messages(&self, room_id: &RoomId) -> CollectionPath {
        self.rooms().child(room_id.as_str(), &self.messages_collection)
    }

    /// User profile collection path.
    pub fn users(&self) -> CollectionPath {
        CollectionPath::root(self.users_collection.as_str())
    }
}
