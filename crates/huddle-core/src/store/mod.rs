//! Realtime document store contract.
//!
//! Vendor-agnostic view of the backend the chat core is built on: named
//! collections of JSON documents, partial updates with set-union semantics,
//! and live queries that redeliver the *full* current result set on every
//! change.
//!
//! Layout used by the chat core:
//!
//! - `rooms/{roomId}`
//! - `rooms/{roomId}/messages/{messageId}`
//! - `users/{userId}`

mod error;
mod query;
mod subscription;

use std::fmt;

use async_trait::async_trait;
pub use error::StoreError;
pub use query::{Direction, Filter, OrderBy, OrderKey, Query, compare_values, lookup};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
pub use subscription::Subscription;

use crate::model::Timestamp;

/// Document body: a JSON object.
pub type Fields = Map<String, Value>;

/// Slash-separated path of a collection, e.g. `rooms/u1_u2/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Top-level collection.
    pub fn root(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Sub-collection `name` under document `doc_id` of this collection.
    pub fn child(&self, doc_id: &str, name: &str) -> Self {
        Self(format!("{}/{doc_id}/{name}", self.0))
    }

    /// Borrow the path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// Document id within its collection.
    pub id: String,
    /// Store-assigned creation time. Preserved across overwrites.
    pub create_time: Timestamp,
    /// Document body.
    pub fields: Fields,
}

impl DocumentSnapshot {
    /// Field value at a dotted path (`lastMessage.createdAt`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.fields, path)
    }
}

/// A single field mutation for [`DocumentStore::update_fields`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Overwrite the value at a dotted path, creating intermediate objects.
    Set {
        /// Dotted field path.
        path: String,
        /// New value.
        value: Value,
    },

    /// Append each value not already present to the array at `path`.
    ///
    /// Idempotent and commutative: concurrent unions never lose entries.
    /// A missing or non-array field becomes a fresh array.
    ArrayUnion {
        /// Dotted field path.
        path: String,
        /// Values to add.
        values: Vec<Value>,
    },

    /// Remove every occurrence of each value from the array at `path`.
    ArrayRemove {
        /// Dotted field path.
        path: String,
        /// Values to remove.
        values: Vec<Value>,
    },
}

impl FieldUpdate {
    /// `Set` from any serializable value.
    pub fn set(path: impl Into<String>, value: impl Serialize) -> Result<Self, StoreError> {
        let value = serde_json::to_value(value)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        Ok(Self::Set { path: path.into(), value })
    }

    /// Apply this update to a document body.
    pub fn apply(&self, fields: &mut Fields) {
        match self {
            Self::Set { path, value } => assign(fields, path, value.clone()),
            Self::ArrayUnion { path, values } => {
                let mut current = match lookup(fields, path) {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                for value in values {
                    if !current.contains(value) {
                        current.push(value.clone());
                    }
                }
                assign(fields, path, Value::Array(current));
            },
            Self::ArrayRemove { path, values } => {
                let mut current = match lookup(fields, path) {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                current.retain(|item| !values.contains(item));
                assign(fields, path, Value::Array(current));
            },
        }
    }
}

/// Write `value` at a dotted path, replacing non-object intermediates.
fn assign(fields: &mut Fields, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            fields.insert(path.to_string(), value);
        },
        Some((head, rest)) => {
            let entry = fields.entry(head.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                assign(child, rest, value);
            }
        },
    }
}

/// Encode a serializable entity as a document body.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Serialization(format!("expected an object, got {other}"))),
        Err(err) => Err(StoreError::Serialization(err.to_string())),
    }
}

/// Decode a document body into an entity.
pub fn decode<T: DeserializeOwned>(fields: &Fields) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Realtime document store.
///
/// Every method is a suspension point: between issuing a call and its
/// completion the caller's runtime keeps processing other events, and no
/// ordering is guaranteed between the completions of concurrent calls.
///
/// Must be Clone (handed to every component and spawned task), Send + Sync.
/// Implementations typically share internal state via Arc, so clones access
/// the same underlying store.
#[async_trait]
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Read one document. `None` if it does not exist.
    async fn get_document(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<DocumentSnapshot>, StoreError>;

    /// Create or overwrite a document.
    ///
    /// Idempotent: writing the same body twice leaves one document. The
    /// create time of an existing document is preserved.
    async fn set_document(
        &self,
        collection: &CollectionPath,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Apply partial updates to an existing document, atomically per call.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the document does not exist
    async fn update_fields(
        &self,
        collection: &CollectionPath,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), StoreError>;

    /// Append a new document. The store assigns the id and create time.
    async fn add_document(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentSnapshot, StoreError>;

    /// One-shot query.
    async fn query_documents(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<DocumentSnapshot>, StoreError>;

    /// Live query. Yields the full ordered result set immediately and again
    /// after every change that alters it.
    async fn subscribe_query(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> Result<Subscription<Vec<DocumentSnapshot>>, StoreError>;

    /// Live document. Yields the current snapshot (`None` if absent)
    /// immediately and again after every change.
    async fn subscribe_document(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Subscription<Option<DocumentSnapshot>>, StoreError>;
}
