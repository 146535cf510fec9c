//! Property-based tests for the private room resolver and query ordering.
//!
//! These verify invariants that must hold for all inputs: both participants
//! of a 1:1 chat derive the same id without coordination, distinct pairs
//! never collide, and query evaluation is a total, stable order.

use std::collections::HashSet;

use huddle_core::{
    ChatError, Timestamp, UserId, resolve_private_room_id,
    store::{DocumentSnapshot, Fields, Query},
};
use proptest::prelude::*;

fn user_id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,28}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: resolution is commutative
    #[test]
    fn prop_resolution_commutes(a in user_id(), b in user_id()) {
        prop_assume!(a != b);
        let a = UserId::new(a)?;
        let b = UserId::new(b)?;

        prop_assert_eq!(resolve_private_room_id(&a, &b)?, resolve_private_room_id(&b, &a)?);
    }

    /// Property: self-chat always fails with InvalidIdentity
    #[test]
    fn prop_self_chat_rejected(a in user_id()) {
        let a = UserId::new(a)?;
        let result = resolve_private_room_id(&a, &a);
        prop_assert!(matches!(result, Err(ChatError::InvalidIdentity(_))));
    }

    /// Property: the id embeds both members, smaller first
    #[test]
    fn prop_id_embeds_sorted_members(a in user_id(), b in user_id()) {
        prop_assume!(a != b);
        let (low, high) = if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
        let room = resolve_private_room_id(&UserId::new(a)?, &UserId::new(b)?)?;

        prop_assert_eq!(room.as_str(), format!("{low}_{high}"));
    }

    /// Property: distinct unordered pairs never share a room id
    #[test]
    fn prop_distinct_pairs_do_not_collide(
        ids in prop::collection::hash_set(user_id(), 2..8)
    ) {
        let ids: Vec<UserId> = ids.into_iter().map(UserId::new).collect::<Result<_, _>>()?;
        let mut rooms = HashSet::new();
        let mut pairs = 0;

        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                rooms.insert(resolve_private_room_id(a, b)?);
                pairs += 1;
            }
        }

        prop_assert_eq!(rooms.len(), pairs);
    }

    /// Property: create-time ordering is ascending for any insertion order
    #[test]
    fn prop_create_time_order_is_ascending(
        times in prop::collection::vec(0u64..1_000, 0..32)
    ) {
        let docs: Vec<DocumentSnapshot> = times
            .iter()
            .enumerate()
            .map(|(i, t)| DocumentSnapshot {
                id: format!("{i:04}"),
                create_time: Timestamp::from_millis(*t),
                fields: Fields::new(),
            })
            .collect();

        let ordered = Query::new().evaluate(&docs);

        prop_assert_eq!(ordered.len(), docs.len());
        for pair in ordered.windows(2) {
            prop_assert!(
                (pair[0].create_time, &pair[0].id) <= (pair[1].create_time, &pair[1].id)
            );
        }
    }
}
