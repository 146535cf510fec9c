//! Sync invariants under injected store failures.
//!
//! Failures are seeded, so every run sees the same fault schedule.

use huddle_client::{ChatClient, ClientConfig};
use huddle_core::{ChatError, Room, User, UserId};
use huddle_store::{ChaosScope, ChaoticStore, MemoryStore, SimEnv};

fn profile(raw: &str, name: &str) -> User {
    User {
        user_id: UserId::new(raw).unwrap(),
        username: name.into(),
        profile_image_ref: String::new(),
    }
}

#[tokio::test]
async fn failed_sends_leave_no_trace() {
    let env = SimEnv::with_seed(21);
    let memory = MemoryStore::new(env.clone());
    let chaotic = ChaoticStore::with_seed(memory.clone(), 0.3, ChaosScope::WritesOnly, 42);
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");
    let client = ChatClient::new(chaotic.clone(), env, ann.clone());

    let mut delivered = 0;
    let mut last_projected = None;
    for i in 0..40 {
        let text = format!("message {i}");
        match client.send_private(&bob, &text).await {
            Ok(receipt) => {
                delivered += 1;
                if receipt.preview_updated {
                    last_projected = Some(text);
                }
            },
            Err(err) => {
                assert!(matches!(err, ChatError::StoreUnavailable(_)), "unexpected error: {err}");
                assert!(err.is_transient());
            },
        }
    }

    assert!(chaotic.injected_failures() > 0);
    assert!(delivered > 0);

    let config = ClientConfig::default();
    let room_id = huddle_core::resolve_private_room_id(&bob.user_id, &ann.user_id).unwrap();
    assert_eq!(memory.document_count(&config.messages(&room_id)), delivered);
    assert_eq!(memory.document_count(&config.rooms()), 1);

    let snapshot = memory.peek(&config.rooms(), room_id.as_str()).unwrap();
    let room = Room::from_snapshot(&snapshot).unwrap();
    match last_projected {
        Some(text) => assert_eq!(room.last_message.text, text),
        None => assert!(room.last_message.is_sentinel()),
    }
}

#[tokio::test]
async fn lost_receipts_are_retried_on_next_batch() {
    let env = SimEnv::with_seed(5);
    let memory = MemoryStore::new(env.clone());
    let ann = profile("u1", "Ann");
    let bob = profile("u2", "Bob");

    let ann_client = ChatClient::new(memory.clone(), env.clone(), ann.clone());
    let room_id = ann_client.send_private(&bob, "first").await.unwrap().message.room_id;

    // Every partial update fails: Bob's receipt is lost.
    let flaky = ChaoticStore::with_seed(memory.clone(), 1.0, ChaosScope::UpdatesOnly, 1);
    let bob_flaky = ChatClient::new(flaky, env.clone(), bob.clone());
    let mut feed = bob_flaky.messages().open(&room_id).await.unwrap();
    let batch = feed.next().await.unwrap();
    assert!(!batch[0].is_seen_by(&bob.user_id));
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    feed.dispose();

    // A healthy connection re-issues the receipt from the next snapshot.
    let bob_client = ChatClient::new(memory.clone(), env, bob.clone());
    let mut feed = bob_client.messages().open(&room_id).await.unwrap();
    let unseen = feed.next().await.unwrap();
    assert!(!unseen[0].is_seen_by(&bob.user_id));
    let seen = feed.next().await.unwrap();
    assert!(seen[0].is_seen_by(&bob.user_id));
}
