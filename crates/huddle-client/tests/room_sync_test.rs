//! End-to-end sync scenarios over the in-memory store.
//!
//! Every client shares one `MemoryStore`, the same way real devices share
//! one backend. Store operations yield before running, so concurrent calls
//! interleave as they would over a network.

use std::collections::BTreeSet;

use huddle_client::{
    ChatClient, ClientConfig, GroupUpdate, RoomLifecycle, RoomMetadata, RoomPreview,
    SubscriptionHandle,
    view::{ReceiptStatus, RoomEvent, RoomView},
};
use huddle_core::{
    AuthError, ChatError, DocumentStore, IdentityProvider, Room, RoomKind, SignUpProfile, User, UserId,
    resolve_private_room_id,
};
use huddle_store::{MemoryIdentity, MemoryStore, SimEnv};
use tokio::sync::mpsc;

type Client = ChatClient<MemoryStore, SimEnv>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn user(raw: &str) -> UserId {
    UserId::new(raw).unwrap()
}

fn profile(raw: &str, name: &str) -> User {
    User { user_id: user(raw), username: name.into(), profile_image_ref: format!("{raw}.png") }
}

struct World {
    env: SimEnv,
    store: MemoryStore,
}

impl World {
    fn new(seed: u64) -> Self {
        init_tracing();
        let env = SimEnv::with_seed(seed);
        Self { store: MemoryStore::new(env.clone()), env }
    }

    fn client(&self, viewer: &User) -> Client {
        ChatClient::new(self.store.clone(), self.env.clone(), viewer.clone())
    }

    fn room(&self, room_id: &huddle_core::RoomId) -> Room {
        let snapshot = self.store.peek(&ClientConfig::default().rooms(), room_id.as_str()).unwrap();
        Room::from_snapshot(&snapshot).unwrap()
    }
}

/// Let spawned receipt and subscription tasks run to completion.
async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn both_participants_resolve_and_create_one_room() {
    let world = World::new(1);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");

    let from_ann = resolve_private_room_id(&ann.user_id, &bob.user_id).unwrap();
    let from_bob = resolve_private_room_id(&bob.user_id, &ann.user_id).unwrap();
    assert_eq!(from_ann, from_bob);
    assert_eq!(from_ann.as_str(), "u1_u2");

    let ann_client = world.client(&ann);
    let bob_client = world.client(&bob);
    let (a, b) =
        tokio::join!(ann_client.open_private_chat(&bob), bob_client.open_private_chat(&ann));
    assert_eq!(a.unwrap(), b.unwrap());

    assert_eq!(world.store.document_count(&ClientConfig::default().rooms()), 1);
    let room = world.room(&from_ann);
    assert_eq!(room.kind, RoomKind::Private);
    assert_eq!(room.members, BTreeSet::from([ann.user_id, bob.user_id]));
    assert!(room.last_message.is_sentinel());
}

#[tokio::test]
async fn many_concurrent_ensures_leave_one_document() {
    let world = World::new(2);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let room_id = resolve_private_room_id(&ann.user_id, &bob.user_id).unwrap();
    let lifecycle = RoomLifecycle::new(world.store.clone(), world.env.clone(), Default::default());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let lifecycle = lifecycle.clone();
        let room_id = room_id.clone();
        let metadata = if i % 2 == 0 {
            RoomMetadata::private(&ann, &bob)
        } else {
            RoomMetadata::private(&bob, &ann)
        };
        tasks.push(tokio::spawn(async move { lifecycle.ensure_room(&room_id, &metadata).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(world.store.document_count(&ClientConfig::default().rooms()), 1);

    // The stored body is one caller's metadata, never a blend of two.
    let room = world.room(&room_id);
    let written = [RoomMetadata::private(&ann, &bob), RoomMetadata::private(&bob, &ann)];
    assert!(written.iter().any(|metadata| {
        room.display_name == metadata.display_name
            && room.image_ref == metadata.image_ref
            && room.created_by == metadata.created_by
            && room.members == metadata.members
    }));
}

#[tokio::test]
async fn hello_is_delivered_then_marked_seen() {
    let world = World::new(3);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let ann_client = world.client(&ann);
    let bob_client = world.client(&bob);
    let room_id = resolve_private_room_id(&ann.user_id, &bob.user_id).unwrap();

    // Bob opens the chat before any room exists.
    let mut bob_feed = bob_client.messages().open(&room_id).await.unwrap();
    assert!(bob_feed.next().await.unwrap().is_empty());

    world.env.advance(50);
    let receipt = ann_client.send_private(&bob, "hello").await.unwrap();
    assert!(receipt.preview_updated);

    let batch = bob_feed.next().await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].text, "hello");
    assert_eq!(batch[0].seen_by, BTreeSet::from([ann.user_id.clone()]));

    // Observing the batch issues Bob's receipt.
    let batch = bob_feed.next().await.unwrap();
    assert_eq!(batch[0].seen_by, BTreeSet::from([ann.user_id.clone(), bob.user_id.clone()]));

    settle().await;
    let room = world.room(&room_id);
    assert!(room.last_message.seen_by.contains(&bob.user_id));
    assert!(!RoomPreview::new(&room, &bob.user_id, Some(&ann)).unread);

    // Ann's view now shows the message as seen.
    let mut view = RoomView::new(ann.user_id.clone(), room_id.clone());
    view.handle(RoomEvent::RoomChanged(Some(room)));
    view.handle(RoomEvent::MessagesChanged(batch));
    let message = &view.messages()[0];
    assert!(view.is_mine(message));
    assert_eq!(view.receipt_status(message), ReceiptStatus::Seen);
}

#[tokio::test]
async fn own_messages_trigger_no_receipts() {
    let world = World::new(4);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let ann_client = world.client(&ann);
    let receipt = ann_client.send_private(&bob, "hi").await.unwrap();
    let room_id = receipt.message.room_id.clone();
    let writes = world.store.write_count();

    let mut feed = ann_client.messages().open(&room_id).await.unwrap();
    assert_eq!(feed.next().await.unwrap().len(), 1);
    settle().await;

    assert_eq!(world.store.write_count(), writes);
}

#[tokio::test]
async fn unseen_backlog_costs_one_receipt_per_message() {
    const BACKLOG: usize = 30;

    let world = World::new(13);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let ann_client = world.client(&ann);
    let bob_client = world.client(&bob);

    let room_id = ann_client.open_private_chat(&bob).await.unwrap();
    for i in 0..BACKLOG {
        ann_client.send(&room_id, &format!("message {i}")).await.unwrap();
    }
    let writes = world.store.write_count();

    let mut feed = bob_client.messages().open(&room_id).await.unwrap();
    let mut batch = feed.next().await.unwrap();
    assert_eq!(batch.len(), BACKLOG);
    while !batch.iter().all(|message| message.is_seen_by(&bob.user_id)) {
        batch = feed.next().await.unwrap();
    }
    settle().await;

    // One receipt per message plus one for the preview.
    assert_eq!(world.store.write_count() - writes, BACKLOG + 1);
    assert!(world.room(&room_id).last_message.seen_by.contains(&bob.user_id));
}

#[tokio::test]
async fn fresh_subscription_delivers_ascending_order() {
    let world = World::new(5);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let ann_client = world.client(&ann);
    let bob_client = world.client(&bob);

    let room_id = ann_client.send_private(&bob, "one").await.unwrap().message.room_id;
    world.env.advance(10);
    bob_client.send(&room_id, "two").await.unwrap();
    world.env.advance(10);
    ann_client.send(&room_id, "three").await.unwrap();

    let mut feed = ann_client.messages().open(&room_id).await.unwrap();
    let batch = feed.next().await.unwrap();
    let texts: Vec<_> = batch.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["one", "two", "three"]);
    assert!(batch.windows(2).all(|pair| pair[0].created_at < pair[1].created_at));

    let room = world.room(&room_id);
    assert_eq!(room.last_message.text, "three");
    assert_eq!(room.last_message.sender_id, Some(ann.user_id));
}

#[tokio::test]
async fn disposed_subscription_stops_delivery() {
    let world = World::new(6);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let ann_client = world.client(&ann);
    let room_id = ann_client.open_private_chat(&bob).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle: SubscriptionHandle = ann_client
        .subscribe_messages(&room_id, move |batch| {
            let _ = tx.send(batch.len());
        })
        .await
        .unwrap();

    assert_eq!(rx.recv().await, Some(0));
    ann_client.send(&room_id, "first").await.unwrap();
    assert_eq!(rx.recv().await, Some(1));

    handle.dispose();
    handle.dispose();
    assert!(!handle.is_active());

    ann_client.send(&room_id, "second").await.unwrap();
    settle().await;
    assert!(rx.try_recv().is_err());
    assert_eq!(world.store.watcher_count(), 0);
}

#[tokio::test]
async fn dropped_handle_releases_watcher() {
    let world = World::new(7);
    let ann = profile("u1", "Ann");
    let client = world.client(&ann);

    let handle = client.subscribe_rooms(|_| {}).await.unwrap();
    settle().await;
    assert_eq!(world.store.watcher_count(), 1);

    drop(handle);
    settle().await;
    assert_eq!(world.store.watcher_count(), 0);
}

#[tokio::test]
async fn removed_member_loses_group_from_list() {
    let world = World::new(8);
    let ann = profile("u1", "Ann");
    let carl = profile("u3", "Carl");
    let ann_client = world.client(&ann);
    let carl_client = world.client(&carl);

    let room_id = ann_client.create_group("Trip", "", [user("u2"), user("u3")]).await.unwrap();

    let mut carl_rooms = carl_client.rooms().open(&carl.user_id).await.unwrap();
    let before = carl_rooms.next().await.unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].display_name, "Trip");

    ann_client
        .update_group(&room_id, GroupUpdate::default().members([user("u1"), user("u2")]))
        .await
        .unwrap();

    assert!(carl_rooms.next().await.unwrap().is_empty());

    let mut ann_rooms = ann_client.rooms().open(&ann.user_id).await.unwrap();
    let rooms = ann_rooms.next().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].members, BTreeSet::from([user("u1"), user("u2")]));

    let denied = carl_client.send(&room_id, "still here?").await;
    assert!(matches!(denied, Err(ChatError::MembershipViolation(_))));
}

#[tokio::test]
async fn room_list_puts_new_rooms_first_then_recent_activity() {
    let world = World::new(9);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let ann_client = world.client(&ann);

    let private = ann_client.send_private(&bob, "hey").await.unwrap().message.room_id;
    world.env.advance(100);
    let group = ann_client.create_group("Trip", "", [user("u2")]).await.unwrap();

    let mut feed = ann_client.rooms().open(&ann.user_id).await.unwrap();
    let order: Vec<_> = feed.next().await.unwrap().into_iter().map(|r| r.room_id).collect();
    assert_eq!(order, [group.clone(), private.clone()]);

    world.env.advance(100);
    ann_client.send(&private, "again").await.unwrap();
    world.env.advance(100);
    ann_client.send(&group, "first in group").await.unwrap();

    // Drain batches until both projections are visible.
    let mut latest = feed.next().await.unwrap();
    while latest.iter().any(|room| room.last_message.is_sentinel()) {
        latest = feed.next().await.unwrap();
    }
    let order: Vec<_> = latest.into_iter().map(|r| r.room_id).collect();
    assert_eq!(order, [group, private]);
}

#[tokio::test]
async fn watch_room_follows_renames() {
    let world = World::new(10);
    let ann = profile("u1", "Ann");
    let client = world.client(&ann);
    let room_id = client.create_group("Trip", "", [user("u2")]).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = client
        .rooms()
        .watch_room(&room_id, move |room| {
            let _ = tx.send(room.map(|room| room.display_name));
        })
        .await
        .unwrap();

    assert_eq!(rx.recv().await, Some(Some("Trip".to_string())));
    client.update_group(&room_id, GroupUpdate::default().display_name("Ski trip")).await.unwrap();
    assert_eq!(rx.recv().await, Some(Some("Ski trip".to_string())));
}

#[tokio::test]
async fn profile_image_change_keeps_history() {
    let world = World::new(11);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let mut ann_client = world.client(&ann);
    let config = ClientConfig::default();
    world
        .store
        .set_document(&config.users(), "u1", huddle_core::store::encode(&ann).unwrap())
        .await
        .unwrap();

    let old = ann_client.send_private(&bob, "before").await.unwrap();
    ann_client.update_profile_image("new.png").await.unwrap();
    let new = ann_client.send(&old.message.room_id, "after").await.unwrap();

    let mut feed = ann_client.messages().open(&old.message.room_id).await.unwrap();
    let batch = feed.next().await.unwrap();
    assert_eq!(batch[0].sender_image_ref, "u1.png");
    assert_eq!(batch[1].sender_image_ref, "new.png");
    assert_eq!(new.message.sender_image_ref, "new.png");
}

#[tokio::test]
async fn client_resolves_signed_in_user() {
    let world = World::new(12);
    let identity = MemoryIdentity::new(world.store.clone(), world.env.clone());

    let (store, env) = (world.store.clone(), world.env.clone());
    let missing =
        ChatClient::for_current_user(&identity, store, env, ClientConfig::default()).await;
    assert!(matches!(missing, Err(ChatError::Auth(AuthError::NotSignedIn))));

    let profile = SignUpProfile { username: "Ann".into(), profile_image_ref: String::new() };
    let ann = identity.sign_up("ann@example.com", "secret1", profile).await.unwrap();
    assert_eq!(identity.current_identity(), Some(ann.user_id.clone()));

    let (store, env) = (world.store.clone(), world.env.clone());
    let client =
        ChatClient::for_current_user(&identity, store, env, ClientConfig::default()).await.unwrap();
    assert_eq!(client.viewer(), &ann);

    let contacts = client.directory().contacts(&ann.user_id).await.unwrap();
    assert!(contacts.is_empty());
}
