//! Room list screen state.

use std::collections::HashMap;

use huddle_core::{Room, User, UserId};

use super::ViewAction;
use crate::room_list::RoomPreview;

/// Inputs to [`RoomListView`].
#[derive(Debug, Clone)]
pub enum RoomListEvent {
    /// A full, ordered room batch from the room feed.
    RoomsChanged(Vec<Room>),
    /// Known user profiles, used to title private rooms.
    ContactsLoaded(Vec<User>),
}

/// State of the room list.
#[derive(Debug, Clone)]
pub struct RoomListView {
    viewer: UserId,
    rooms: Vec<Room>,
    contacts: HashMap<UserId, User>,
    previews: Vec<RoomPreview>,
}

impl RoomListView {
    /// Empty list for `viewer`.
    pub fn new(viewer: UserId) -> Self {
        Self { viewer, rooms: Vec::new(), contacts: HashMap::new(), previews: Vec::new() }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: RoomListEvent) -> Vec<ViewAction> {
        match event {
            RoomListEvent::RoomsChanged(rooms) => self.rooms = rooms,
            RoomListEvent::ContactsLoaded(users) => {
                self.contacts =
                    users.into_iter().map(|user| (user.user_id.clone(), user)).collect();
            },
        }
        self.rebuild();
        vec![ViewAction::Render]
    }

    fn rebuild(&mut self) {
        self.previews = self
            .rooms
            .iter()
            .map(|room| {
                let peer = room.peer_of(&self.viewer).and_then(|peer| self.contacts.get(peer));
                RoomPreview::new(room, &self.viewer, peer)
            })
            .collect();
    }

    /// Previews in display order.
    pub fn previews(&self) -> &[RoomPreview] {
        &self.previews
    }

    /// Number of rooms whose latest message the viewer has not seen.
    pub fn unread_count(&self) -> usize {
        self.previews.iter().filter(|preview| preview.unread).count()
    }

    /// True if the viewer has no rooms.
    pub fn is_empty(&self) -> bool {
        self.previews.is_empty()
    }
}
