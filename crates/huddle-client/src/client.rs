//! Per-user facade over the sync components.

use std::sync::Arc;

use huddle_core::{
    AuthError, ChatError, DocumentStore, Environment, IdentityProvider, Message, Room, RoomId, User,
    UserId, resolve_private_room_id,
};
use tracing::info;

use crate::{
    config::ClientConfig,
    directory::UserDirectory,
    group::{GroupEditor, GroupUpdate},
    handle::SubscriptionHandle,
    lifecycle::{RoomLifecycle, RoomMetadata},
    receipts::SeenTracker,
    room_list::RoomList,
    sender::{MessageSender, SendReceipt},
    stream::MessageStream,
};

/// Chat client bound to one signed-in user.
///
/// Cheap to clone; clones share the store and configuration. The viewer is
/// fixed at construction: after sign-out, drop the client together with its
/// subscription handles and build a new one for the next user.
#[derive(Clone)]
pub struct ChatClient<S: DocumentStore, E: Environment> {
    viewer: User,
    store: S,
    env: E,
    config: Arc<ClientConfig>,
}

impl<S: DocumentStore, E: Environment> ChatClient<S, E> {
    /// Client for `viewer` with the default collection layout.
    pub fn new(store: S, env: E, viewer: User) -> Self {
        Self::with_config(store, env, viewer, ClientConfig::default())
    }

    /// Client for `viewer` with a custom collection layout.
    pub fn with_config(store: S, env: E, viewer: User, config: ClientConfig) -> Self {
        Self { viewer, store, env, config: Arc::new(config) }
    }

    /// Client for whoever `identity` reports as signed in, with the profile
    /// read from the user collection.
    ///
    /// # Errors
    ///
    /// - `Auth(NotSignedIn)` if nobody is signed in
    /// - `NotFound` if the signed-in user has no profile document
    pub async fn for_current_user<I>(
        identity: &I,
        store: S,
        env: E,
        config: ClientConfig,
    ) -> Result<Self, ChatError>
    where
        I: IdentityProvider + ?Sized,
    {
        let user_id = identity.current_identity().ok_or(AuthError::NotSignedIn)?;
        let directory = UserDirectory::new(store.clone(), Arc::new(config.clone()));
        let viewer = directory
            .get_user(&user_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("{}/{user_id}", config.users())))?;

        info!(user_id = %viewer.user_id, username = %viewer.username, "chat client ready");
        Ok(Self::with_config(store, env, viewer, config))
    }

    /// The signed-in user.
    pub fn viewer(&self) -> &User {
        &self.viewer
    }

    fn viewer_id(&self) -> &UserId {
        &self.viewer.user_id
    }

    /// Collection layout.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Room creation.
    pub fn lifecycle(&self) -> RoomLifecycle<S, E> {
        RoomLifecycle::new(self.store.clone(), self.env.clone(), Arc::clone(&self.config))
    }

    /// Message streams for the viewer.
    pub fn messages(&self) -> MessageStream<S> {
        MessageStream::new(self.store.clone(), Arc::clone(&self.config), self.viewer_id().clone())
    }

    /// Seen receipts.
    pub fn receipts(&self) -> SeenTracker<S> {
        SeenTracker::new(self.store.clone(), Arc::clone(&self.config))
    }

    /// Room list.
    pub fn rooms(&self) -> RoomList<S> {
        RoomList::new(self.store.clone(), Arc::clone(&self.config))
    }

    /// Group editing.
    pub fn groups(&self) -> GroupEditor<S> {
        GroupEditor::new(self.store.clone(), Arc::clone(&self.config))
    }

    /// Send path.
    pub fn sender(&self) -> MessageSender<S, E> {
        MessageSender::new(self.store.clone(), self.env.clone(), Arc::clone(&self.config))
    }

    /// User directory.
    pub fn directory(&self) -> UserDirectory<S> {
        UserDirectory::new(self.store.clone(), Arc::clone(&self.config))
    }

    /// Open (creating if needed) the private room with `peer`.
    pub async fn open_private_chat(&self, peer: &User) -> Result<RoomId, ChatError> {
        self.lifecycle().open_private(&self.viewer, peer).await
    }

    /// Create a group with the viewer and `selected`.
    pub async fn create_group(
        &self,
        name: &str,
        image_ref: &str,
        selected: impl IntoIterator<Item = UserId>,
    ) -> Result<RoomId, ChatError> {
        self.lifecycle().create_group(self.viewer_id(), name, image_ref, selected).await
    }

    /// Send to the private room with `peer`, creating it on first message.
    pub async fn send_private(&self, peer: &User, text: &str) -> Result<SendReceipt, ChatError> {
        let room_id = resolve_private_room_id(self.viewer_id(), &peer.user_id)?;
        let metadata = RoomMetadata::private(&self.viewer, peer);
        self.sender().send(&room_id, &metadata, &self.viewer, text).await
    }

    /// Send to an existing room.
    pub async fn send(&self, room_id: &RoomId, text: &str) -> Result<SendReceipt, ChatError> {
        self.sender().send_to_room(room_id, &self.viewer, text).await
    }

    /// Follow a room's messages, marking them seen as they arrive.
    pub async fn subscribe_messages<F>(
        &self,
        room_id: &RoomId,
        on_batch: F,
    ) -> Result<SubscriptionHandle, ChatError>
    where
        F: FnMut(Vec<Message>) + Send + 'static,
    {
        self.messages().subscribe(room_id, on_batch).await
    }

    /// Follow the viewer's room list.
    pub async fn subscribe_rooms<F>(&self, on_batch: F) -> Result<SubscriptionHandle, ChatError>
    where
        F: FnMut(Vec<Room>) + Send + 'static,
    {
        self.rooms().subscribe_rooms(self.viewer_id(), on_batch).await
    }

    /// Edit a group as the viewer.
    pub async fn update_group(
        &self,
        room_id: &RoomId,
        update: GroupUpdate,
    ) -> Result<(), ChatError> {
        self.groups().update_group(self.viewer_id(), room_id, update).await
    }

    /// Change the viewer's profile image. The client keeps its local copy in
    /// sync so later messages carry the new image.
    pub async fn update_profile_image(&mut self, image_ref: &str) -> Result<(), ChatError> {
        self.directory().update_profile_image(self.viewer_id(), image_ref).await?;
        self.viewer.profile_image_ref = image_ref.to_string();
        Ok(())
    }
}
