//! Property-based tests for membership, receipts and room ordering.

use std::collections::BTreeSet;

use huddle_client::{ClientConfig, SeenTracker, order_rooms, validate_members};
use huddle_core::{
    DocumentStore, MessageId, MessageSummary, Room, RoomId, RoomKind, Timestamp, UserId,
    store::encode,
};
use huddle_store::{MemoryStore, SimEnv};
use proptest::prelude::*;
use serde_json::json;

fn user(index: u8) -> UserId {
    UserId::new(format!("u{index}")).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

fn room_strategy() -> impl Strategy<Value = Room> {
    (0u32..1_000, 0u64..50, prop::option::of(0u64..50)).prop_map(|(id, created, last)| {
        let created_at = Timestamp::from_millis(created);
        let last_message = match last {
            None => MessageSummary::sentinel(created_at),
            Some(at) => MessageSummary {
                text: "m".into(),
                sender_id: Some(user(1)),
                created_at: Timestamp::from_millis(created + at),
                seen_by: BTreeSet::from([user(1)]),
                sender_display_name: String::new(),
                sender_image_ref: String::new(),
            },
        };
        Room {
            room_id: RoomId::group(format!("r{id}")).unwrap(),
            kind: RoomKind::Group,
            members: BTreeSet::from([user(1), user(2)]),
            display_name: "g".into(),
            image_ref: String::new(),
            created_by: user(1),
            created_at,
            last_message,
        }
    })
}

proptest! {
    /// A member set is accepted exactly when it keeps the actor and one other.
    #[test]
    fn member_sets_keep_actor_and_one_other(
        actor in 0u8..6,
        members in prop::collection::btree_set(0u8..6, 0..6),
    ) {
        let members: BTreeSet<UserId> = members.into_iter().map(user).collect();
        let actor = user(actor);
        let expected = members.contains(&actor) && members.len() >= 2;
        prop_assert_eq!(validate_members(&actor, &members).is_ok(), expected);
    }

    /// Ordering puts message-less rooms first and is newest-first within
    /// each part.
    #[test]
    fn room_order_is_sentinel_first_then_recency(
        rooms in prop::collection::vec(room_strategy(), 0..12),
    ) {
        let mut ordered = rooms.clone();
        order_rooms(&mut ordered);
        prop_assert_eq!(ordered.len(), rooms.len());

        let first_active = ordered
            .iter()
            .position(|room| !room.last_message.is_sentinel())
            .unwrap_or(ordered.len());
        prop_assert!(ordered[first_active..].iter().all(|room| !room.last_message.is_sentinel()));

        for pair in ordered[..first_active].windows(2) {
            prop_assert!(pair[0].created_at >= pair[1].created_at);
        }
        for pair in ordered[first_active..].windows(2) {
            prop_assert!(pair[0].last_message.created_at >= pair[1].last_message.created_at);
        }
    }

    /// Under any interleaving of receipts the seen set only grows, and ends
    /// as the union of the sender and every viewer.
    #[test]
    fn seen_set_only_grows(viewers in prop::collection::vec(1u8..8, 1..16), seed in any::<u64>()) {
        let rt = runtime();
        rt.block_on(async {
            let store = MemoryStore::new(SimEnv::with_seed(seed));
            let config = std::sync::Arc::new(ClientConfig::default());
            let room = RoomId::group("r").unwrap();
            let messages = config.messages(&room);
            let body =
                encode(&json!({ "senderId": "u0", "text": "hi", "seenBy": ["u0"] })).unwrap();
            let id = MessageId::new(store.add_document(&messages, body).await.unwrap().id);
            let tracker = SeenTracker::new(store.clone(), config);

            let tasks: Vec<_> = viewers
                .iter()
                .map(|viewer| {
                    let tracker = tracker.clone();
                    let (room, id, viewer) = (room.clone(), id.clone(), user(*viewer));
                    tokio::spawn(async move { tracker.mark_seen(&room, &id, &viewer).await })
                })
                .collect();

            let mut previous = 1;
            for task in tasks {
                task.await.unwrap().unwrap();
                let doc = store.peek(&messages, id.as_str()).unwrap();
                let seen = doc.fields["seenBy"].as_array().unwrap().len();
                assert!(seen >= previous);
                previous = seen;
            }

            let expected: BTreeSet<UserId> =
                viewers.iter().copied().map(user).chain(std::iter::once(user(0))).collect();
            let doc = store.peek(&messages, id.as_str()).unwrap();
            let seen: BTreeSet<UserId> =
                serde_json::from_value(doc.fields["seenBy"].clone()).unwrap();
            assert_eq!(seen, expected);
        });
    }
}
