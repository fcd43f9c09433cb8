// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use forum_vote_core::audit::find_drift;
use forum_vote_core::{
    sort_entries, transition, AggregateCounter, ClientVoteCache, Direction, FeedAssembler,
    FeedEntry, FeedQuery, Item, ItemId, MemoryBackend, SortKey, Timestamp, UserId,
    VoteRecordStore, VoteView,
};
use proptest::prelude::*;

const USERS: [&str; 3] = ["ana", "bo", "cy"];
const ITEMS: [&str; 3] = ["q1", "q2", "q3"];

fn item(id: &str, score: i64, created: i64) -> Item {
    Item {
        id: ItemId::new(id),
        title: id.to_owned(),
        details: String::new(),
        channel: "General".into(),
        author: UserId::new("author"),
        created_at: Timestamp(created),
        score,
    }
}

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Up), Just(Direction::Down)]
}

fn maybe_direction() -> impl Strategy<Value = Option<Direction>> {
    prop_oneof![Just(None), direction().prop_map(Some)]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

/// Persist one action the way the client does: row write + independent delta.
async fn cast(store: &MemoryBackend, user: &UserId, item: &ItemId, requested: Direction) {
    let previous = store.vote(user, item).await.unwrap();
    let step = transition(previous, requested);
    match step.next {
        Some(d) => store.upsert_vote(user, item, d).await.unwrap(),
        None => store.delete_vote(user, item).await.unwrap(),
    }
    store.add_delta(item, step.delta).await.unwrap();
}

#[test]
fn transition_is_total_and_delta_tracks_weights() {
    for previous in [None, Some(Direction::Up), Some(Direction::Down)] {
        for requested in [Direction::Up, Direction::Down] {
            let t = transition(previous, requested);
            assert_eq!(
                t.delta,
                Direction::weight_of(t.next) - Direction::weight_of(previous)
            );
            assert!(t.delta != 0, "every action changes the score");
        }
    }
}

proptest! {
    #[test]
    fn repeated_action_is_an_involution(previous in maybe_direction(), requested in direction()) {
        // Applying the same action twice either toggles off then back on, or
        // on then off; either way the pair's deltas cancel when starting from none.
        let first = transition(previous, requested);
        let second = transition(first.next, requested);
        if previous.is_none() {
            prop_assert_eq!(second.next, None);
            prop_assert_eq!(first.delta + second.delta, 0);
        }
        prop_assert_eq!(second.previous, first.next);
    }

    #[test]
    fn score_matches_rows_after_any_action_sequence(
        actions in prop::collection::vec((0usize..3, 0usize..3, direction()), 0..64)
    ) {
        let store = MemoryBackend::new();
        for (i, id) in ITEMS.iter().enumerate() {
            store.insert_item(item(id, 0, i64::try_from(i).unwrap()));
        }
        runtime().block_on(async {
            for (u, q, d) in &actions {
                cast(&store, &UserId::new(USERS[*u]), &ItemId::new(ITEMS[*q]), *d).await;
            }
        });
        let snap = store.snapshot();
        prop_assert!(find_drift(&snap.items, &snap.votes).is_empty());
        for id in ITEMS {
            let q = ItemId::new(id);
            prop_assert_eq!(store.score_of(&q), Some(store.tally_of(&q)));
        }
    }

    #[test]
    fn reconcile_always_equals_fetched_state(
        optimistic in prop::collection::vec((0usize..3, direction()), 0..32),
        fetched in prop::collection::vec((maybe_direction(), -50i64..50), 3)
    ) {
        let cache = ClientVoteCache::new(UserId::new("viewer"));
        for id in ITEMS {
            cache.reconcile_one(&ItemId::new(id), None, 0);
        }
        for (q, d) in &optimistic {
            cache.apply_action(&ItemId::new(ITEMS[*q]), *d).unwrap();
        }

        let mut view = VoteView::new();
        let mut scores = HashMap::new();
        for (id, (vote, score)) in ITEMS.iter().zip(&fetched) {
            if let Some(d) = vote {
                view.insert(ItemId::new(*id), *d);
            }
            scores.insert(ItemId::new(*id), *score);
        }
        cache.reconcile(&view, &scores);

        prop_assert_eq!(cache.view(), view);
        prop_assert_eq!(cache.scores(), scores);
    }

    #[test]
    fn score_sort_is_deterministic(
        rows in prop::collection::vec((-3i64..3, 0i64..5), 1..24)
    ) {
        let entries: Vec<FeedEntry> = rows
            .iter()
            .enumerate()
            .map(|(i, (score, created))| FeedEntry {
                item: item(&format!("q{i:02}"), *score, *created),
                my_vote: None,
                reply_count: 0,
            })
            .collect();

        let mut forward = entries.clone();
        sort_entries(&mut forward, SortKey::Score);
        let mut backward: Vec<FeedEntry> = entries.into_iter().rev().collect();
        sort_entries(&mut backward, SortKey::Score);
        prop_assert_eq!(&forward, &backward);

        for pair in forward.windows(2) {
            let (a, b) = (&pair[0].item, &pair[1].item);
            prop_assert!(a.score >= b.score);
            if a.score == b.score {
                prop_assert!(a.created_at >= b.created_at);
            }
        }
    }
}

#[tokio::test]
async fn anonymous_feed_never_carries_votes() {
    let store = Arc::new(MemoryBackend::new());
    store.insert_item(item("q1", 3, 1));
    store.insert_item(item("q2", 7, 2));
    store
        .upsert_vote(&UserId::new("ana"), &ItemId::new("q1"), Direction::Up)
        .await
        .unwrap();

    let feed = FeedAssembler::new(Arc::clone(&store))
        .load(&FeedQuery::sorted(SortKey::Score), None)
        .await
        .unwrap();

    assert_eq!(feed.viewer, None);
    assert_eq!(feed.ids(), [ItemId::new("q2"), ItemId::new("q1")]);
    assert!(feed.entries.iter().all(|e| e.my_vote.is_none()));
}

#[tokio::test]
async fn equal_scores_place_newer_item_first() {
    let store = Arc::new(MemoryBackend::new());
    store.insert_item(item("t1", 5, 1_000));
    store.insert_item(item("t2", 5, 2_000));

    let feed = FeedAssembler::new(store)
        .load(&FeedQuery::sorted(SortKey::Score), None)
        .await
        .unwrap();

    assert_eq!(feed.ids(), [ItemId::new("t2"), ItemId::new("t1")]);
}

#[tokio::test]
async fn viewer_feed_joins_votes_and_reply_counts() {
    let store = Arc::new(MemoryBackend::new());
    store.insert_item(item("q1", 1, 1));
    store.insert_item(item("q2", -1, 2));
    let ana = UserId::new("ana");
    store
        .upsert_vote(&ana, &ItemId::new("q2"), Direction::Down)
        .await
        .unwrap();
    store
        .upsert_vote(&UserId::new("bo"), &ItemId::new("q1"), Direction::Up)
        .await
        .unwrap();
    store.add_reply(&ItemId::new("q1")).unwrap();

    let feed = FeedAssembler::new(store)
        .load(&FeedQuery::default(), Some(&ana))
        .await
        .unwrap();

    let by_id: HashMap<_, _> = feed
        .entries
        .iter()
        .map(|e| (e.item.id.as_str(), (e.my_vote, e.reply_count)))
        .collect();
    assert_eq!(by_id["q1"], (None, 1));
    assert_eq!(by_id["q2"], (Some(Direction::Down), 0));
}
