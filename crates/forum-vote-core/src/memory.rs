// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory implementation of every store port.
//!
//! [`MemoryBackend`] stands in for the hosted data store in tests and in the
//! developer CLI, which round-trips it through a JSON [`MemorySnapshot`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    AggregateCounter, Direction, Item, ItemId, ItemSource, ReplyCounter, StoreError, UserId,
    VoteRecord, VoteRecordStore,
};

/// Reply count for one item inside a [`MemorySnapshot`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ReplyTally {
    /// Item the replies belong to.
    pub item: ItemId,
    /// Number of replies.
    pub count: u64,
}

/// Serializable image of a [`MemoryBackend`].
///
/// Vectors are sorted by key so two snapshots of equal state serialize
/// identically.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Items, sorted by id.
    #[serde(default)]
    pub items: Vec<Item>,
    /// Vote rows, sorted by `(user, item)`.
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
    /// Reply counts, sorted by item.
    #[serde(default)]
    pub replies: Vec<ReplyTally>,
}

#[derive(Default, Debug)]
struct State {
    items: BTreeMap<ItemId, Item>,
    votes: BTreeMap<(UserId, ItemId), Direction>,
    replies: BTreeMap<ItemId, u64>,
}

/// In-memory forum store.
///
/// All ports share one lock, so `add_delta` is a true atomic add and vote rows
/// obey last-write-wins per key.
///
/// # Invariants
///
/// - At most one vote row per `(user, item)`; the map key enforces it.
/// - Vote rows and score adjustments require the item to exist.
/// - `score` is never overwritten, only adjusted.
#[derive(Default, Debug)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot. Later duplicates overwrite earlier ones.
    pub fn from_snapshot(snapshot: MemorySnapshot) -> Self {
        let mut state = State::default();
        for item in snapshot.items {
            state.items.insert(item.id.clone(), item);
        }
        for vote in snapshot.votes {
            state.votes.insert((vote.user, vote.item), vote.direction);
        }
        for tally in snapshot.replies {
            state.replies.insert(tally.item, tally.count);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Capture the current contents.
    pub fn snapshot(&self) -> MemorySnapshot {
        let state = self.lock();
        MemorySnapshot {
            items: state.items.values().cloned().collect(),
            votes: state
                .votes
                .iter()
                .map(|((user, item), direction)| VoteRecord {
                    user: user.clone(),
                    item: item.clone(),
                    direction: *direction,
                })
                .collect(),
            replies: state
                .replies
                .iter()
                .map(|(item, count)| ReplyTally {
                    item: item.clone(),
                    count: *count,
                })
                .collect(),
        }
    }

    /// Insert or replace an item, including its stored score.
    pub fn insert_item(&self, item: Item) {
        self.lock().items.insert(item.id.clone(), item);
    }

    /// Record one more reply to `item`.
    pub fn add_reply(&self, item: &ItemId) -> Result<u64, StoreError> {
        let mut state = self.lock();
        if !state.items.contains_key(item) {
            return Err(StoreError::ItemNotFound(item.clone()));
        }
        let count = state.replies.entry(item.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    /// Current stored score of `item`.
    pub fn score_of(&self, item: &ItemId) -> Option<i64> {
        self.lock().items.get(item).map(|i| i.score)
    }

    /// Up-rows minus down-rows for `item`.
    pub fn tally_of(&self, item: &ItemId) -> i64 {
        self.lock()
            .votes
            .iter()
            .filter(|((_, voted), _)| voted == item)
            .map(|(_, direction)| direction.weight())
            .sum()
    }

    /// Number of vote rows across all items.
    pub fn vote_count(&self) -> usize {
        self.lock().votes.len()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns `true` if no items are stored.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VoteRecordStore for MemoryBackend {
    async fn upsert_vote(
        &self,
        user: &UserId,
        item: &ItemId,
        direction: Direction,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.items.contains_key(item) {
            return Err(StoreError::ItemNotFound(item.clone()));
        }
        state.votes.insert((user.clone(), item.clone()), direction);
        Ok(())
    }

    async fn delete_vote(&self, user: &UserId, item: &ItemId) -> Result<(), StoreError> {
        self.lock().votes.remove(&(user.clone(), item.clone()));
        Ok(())
    }

    async fn vote(&self, user: &UserId, item: &ItemId) -> Result<Option<Direction>, StoreError> {
        Ok(self
            .lock()
            .votes
            .get(&(user.clone(), item.clone()))
            .copied())
    }

    async fn votes_for(
        &self,
        user: &UserId,
        items: &[ItemId],
    ) -> Result<HashMap<ItemId, Direction>, StoreError> {
        let state = self.lock();
        Ok(items
            .iter()
            .filter_map(|item| {
                state
                    .votes
                    .get(&(user.clone(), item.clone()))
                    .map(|d| (item.clone(), *d))
            })
            .collect())
    }

    async fn delete_votes_for_item(&self, item: &ItemId) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let before = state.votes.len();
        state.votes.retain(|(_, voted), _| voted != item);
        Ok(before - state.votes.len())
    }
}

#[async_trait]
impl AggregateCounter for MemoryBackend {
    async fn add_delta(&self, item: &ItemId, delta: i64) -> Result<i64, StoreError> {
        let mut state = self.lock();
        let stored = state
            .items
            .get_mut(item)
            .ok_or_else(|| StoreError::ItemNotFound(item.clone()))?;
        stored.score += delta;
        Ok(stored.score)
    }
}

#[async_trait]
impl ItemSource for MemoryBackend {
    async fn items(&self, channel: Option<&str>) -> Result<Vec<Item>, StoreError> {
        Ok(self
            .lock()
            .items
            .values()
            .filter(|item| channel.is_none_or(|c| item.channel == c))
            .cloned()
            .collect())
    }

    async fn item(&self, id: &ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.lock().items.get(id).cloned())
    }

    async fn delete_item(&self, id: &ItemId) -> Result<bool, StoreError> {
        Ok(self.lock().items.remove(id).is_some())
    }
}

#[async_trait]
impl ReplyCounter for MemoryBackend {
    async fn reply_counts(&self, items: &[ItemId]) -> Result<HashMap<ItemId, u64>, StoreError> {
        let state = self.lock();
        Ok(items
            .iter()
            .filter_map(|item| state.replies.get(item).map(|c| (item.clone(), *c)))
            .collect())
    }

    async fn delete_replies(&self, item: &ItemId) -> Result<u64, StoreError> {
        Ok(self.lock().replies.remove(item).unwrap_or(0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Timestamp;

    fn item(id: &str, channel: &str, score: i64) -> Item {
        Item {
            id: ItemId::new(id),
            title: format!("title {id}"),
            details: String::new(),
            channel: channel.into(),
            author: UserId::new("author"),
            created_at: Timestamp(0),
            score,
        }
    }

    // ── 1. upsert keeps one row per key ─────────────────────────────────

    #[tokio::test]
    async fn upsert_overwrites_existing_row() {
        let store = MemoryBackend::new();
        store.insert_item(item("q1", "General", 0));
        let (u, q) = (UserId::new("a"), ItemId::new("q1"));
        store.upsert_vote(&u, &q, Direction::Up).await.unwrap();
        store.upsert_vote(&u, &q, Direction::Down).await.unwrap();
        assert_eq!(store.vote_count(), 1);
        assert_eq!(store.vote(&u, &q).await.unwrap(), Some(Direction::Down));
    }

    // ── 2. delete of a missing row is a no-op ───────────────────────────

    #[tokio::test]
    async fn delete_missing_vote_is_noop() {
        let store = MemoryBackend::new();
        store
            .delete_vote(&UserId::new("a"), &ItemId::new("nope"))
            .await
            .unwrap();
        assert_eq!(store.vote_count(), 0);
    }

    // ── 3. add_delta adjusts, never overwrites ──────────────────────────

    #[tokio::test]
    async fn add_delta_accumulates() {
        let store = MemoryBackend::new();
        store.insert_item(item("q1", "General", 10));
        let q = ItemId::new("q1");
        assert_eq!(store.add_delta(&q, 1).await.unwrap(), 11);
        assert_eq!(store.add_delta(&q, -2).await.unwrap(), 9);
        assert_eq!(store.score_of(&q), Some(9));
    }

    // ── 4. writes against a missing item are rejected ───────────────────

    #[tokio::test]
    async fn writes_require_existing_item() {
        let store = MemoryBackend::new();
        let q = ItemId::new("ghost");
        let err = store.add_delta(&q, 1).await.unwrap_err();
        assert_eq!(err, StoreError::ItemNotFound(q.clone()));
        let err = store
            .upsert_vote(&UserId::new("a"), &q, Direction::Up)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::ItemNotFound(q));
        assert_eq!(store.vote_count(), 0);
    }

    // ── 5. channel filter ───────────────────────────────────────────────

    #[tokio::test]
    async fn items_filter_by_channel() {
        let store = MemoryBackend::new();
        store.insert_item(item("q1", "General", 0));
        store.insert_item(item("q2", "Civil", 0));
        assert_eq!(store.items(None).await.unwrap().len(), 2);
        let civil = store.items(Some("Civil")).await.unwrap();
        assert_eq!(civil.len(), 1);
        assert_eq!(civil[0].id, ItemId::new("q2"));
    }

    // ── 6. bulk lookup only returns voted items ─────────────────────────

    #[tokio::test]
    async fn votes_for_skips_unvoted_items() {
        let store = MemoryBackend::new();
        store.insert_item(item("q1", "General", 0));
        store.insert_item(item("q2", "General", 0));
        let u = UserId::new("a");
        store
            .upsert_vote(&u, &ItemId::new("q2"), Direction::Up)
            .await
            .unwrap();
        let votes = store
            .votes_for(&u, &[ItemId::new("q1"), ItemId::new("q2")])
            .await
            .unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes.get(&ItemId::new("q2")), Some(&Direction::Up));
    }

    // ── 7. snapshot round trip preserves state ──────────────────────────

    #[tokio::test]
    async fn snapshot_rebuilds_equal_store() {
        let store = MemoryBackend::new();
        store.insert_item(item("q1", "General", 1));
        let q = ItemId::new("q1");
        store
            .upsert_vote(&UserId::new("a"), &q, Direction::Up)
            .await
            .unwrap();
        store.add_reply(&q).unwrap();
        let snap = store.snapshot();
        let rebuilt = MemoryBackend::from_snapshot(snap.clone());
        assert_eq!(rebuilt.snapshot(), snap);
        assert_eq!(rebuilt.tally_of(&q), 1);
    }

    // ── 8. cascade helpers ──────────────────────────────────────────────

    #[tokio::test]
    async fn cascade_helpers_remove_dependents() {
        let store = MemoryBackend::new();
        store.insert_item(item("q1", "General", 0));
        let q = ItemId::new("q1");
        for user in ["a", "b"] {
            store
                .upsert_vote(&UserId::new(user), &q, Direction::Down)
                .await
                .unwrap();
        }
        store.add_reply(&q).unwrap();
        store.add_reply(&q).unwrap();
        assert_eq!(store.delete_votes_for_item(&q).await.unwrap(), 2);
        assert_eq!(store.delete_replies(&q).await.unwrap(), 2);
        assert!(store.delete_item(&q).await.unwrap());
        assert!(!store.delete_item(&q).await.unwrap());
        assert!(store.is_empty());
    }
}
