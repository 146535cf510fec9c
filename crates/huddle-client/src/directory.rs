//! User directory: contact listing and profile lookups.

use std::sync::Arc;

use huddle_core::{
    ChatError, DocumentStore, User, UserId,
    store::{Direction, FieldUpdate, Filter, OrderKey, Query, decode},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// Reads and edits user profiles.
#[derive(Clone)]
pub struct UserDirectory<S: DocumentStore> {
    store: S,
    config: Arc<ClientConfig>,
}

impl<S: DocumentStore> UserDirectory<S> {
    /// Directory over `store`.
    pub fn new(store: S, config: Arc<ClientConfig>) -> Self {
        Self { store, config }
    }

    /// Profile of `user_id`, if registered.
    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, ChatError> {
        let snapshot = self.store.get_document(&self.config.users(), user_id.as_str()).await?;
        Ok(snapshot.map(|snapshot| decode::<User>(&snapshot.fields)).transpose()?)
    }

    /// Every other registered user, ordered by username.
    pub async fn contacts(&self, viewer: &UserId) -> Result<Vec<User>, ChatError> {
        let query = Query::new()
            .filter(Filter::NotEqual {
                path: "userId".into(),
                value: Value::String(viewer.as_str().to_string()),
            })
            .order_by(OrderKey::Field("username".into()), Direction::Ascending);
        let snapshots = self.store.query_documents(&self.config.users(), &query).await?;

        let users: Vec<User> = snapshots
            .iter()
            .filter_map(|snapshot| match decode::<User>(&snapshot.fields) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(user_id = %snapshot.id, error = %err, "skipping malformed profile");
                    None
                },
            })
            .collect();
        debug!(viewer = %viewer, count = users.len(), "contacts loaded");
        Ok(users)
    }

    /// Contacts whose username contains `needle`, ignoring case.
    pub async fn search(&self, viewer: &UserId, needle: &str) -> Result<Vec<User>, ChatError> {
        let needle = needle.trim().to_lowercase();
        let mut users = self.contacts(viewer).await?;
        if !needle.is_empty() {
            users.retain(|user| user.username.to_lowercase().contains(&needle));
        }
        Ok(users)
    }

    /// Replace a user's profile image. Messages already sent keep the image
    /// they were sent with.
    pub async fn update_profile_image(
        &self,
        user_id: &UserId,
        image_ref: &str,
    ) -> Result<(), ChatError> {
        let update = FieldUpdate::set("profileImageRef", image_ref)?;
        self.store.update_fields(&self.config.users(), user_id.as_str(), vec![update]).await?;
        debug!(user_id = %user_id, "profile image updated");
        Ok(())
    }
}
