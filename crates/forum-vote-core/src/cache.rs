// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Optimistic per-viewer vote cache.
//!
//! [`ClientVoteCache`] holds what the viewer currently sees: their vote and the
//! score of each visible item. Votes are applied locally before the store
//! confirms them; every feed load replaces the whole cache with authoritative
//! values. There is no rollback and no retry: a failed store write stays
//! visible until the next [`reconcile`](ClientVoteCache::reconcile).
//!
//! # Locking
//!
//! The entry map sits behind a short-lived outer lock; each entry has its own
//! lock, so read-modify-write on one item is serialized in call order without
//! blocking votes on other items. No lock is held across an await.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::{transition, Direction, ItemId, Transition, UserId, VoteError};

/// Viewer's vote per item. Items without a vote are absent.
pub type VoteView = HashMap<ItemId, Direction>;

/// Locally known vote and score for one item.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CachedVote {
    /// Viewer's vote as currently displayed.
    pub direction: Option<Direction>,
    /// Item score as currently displayed.
    pub score: i64,
}

type Entry = Arc<Mutex<CachedVote>>;

/// Optimistic mirror of "my vote per item" and "item score".
///
/// Created when a viewer session starts and dropped on sign-out.
pub struct ClientVoteCache {
    viewer: UserId,
    entries: Mutex<HashMap<ItemId, Entry>>,
}

impl ClientVoteCache {
    /// Create an empty cache for `viewer`.
    pub fn new(viewer: UserId) -> Self {
        Self {
            viewer,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The viewer this cache belongs to.
    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    /// Set the local vote and add `delta` to the local score.
    ///
    /// Creates the entry (score 0) if the item was never loaded.
    pub fn apply_optimistic(&self, item: &ItemId, direction: Option<Direction>, delta: i64) {
        let entry = self.entry_or_default(item);
        let mut cached = lock(&entry);
        cached.direction = direction;
        cached.score += delta;
    }

    /// Run the vote state machine against the current local vote and apply
    /// the result, all under the item's lock.
    ///
    /// A second call on the same item observes the first call's optimistic
    /// direction, so rapid repeats converge instead of drifting.
    pub fn apply_action(
        &self,
        item: &ItemId,
        requested: Direction,
    ) -> Result<(Transition, CachedVote), VoteError> {
        let entry = self
            .entry(item)
            .ok_or_else(|| VoteError::NotLoaded(item.clone()))?;
        let mut cached = lock(&entry);
        let step = transition(cached.direction, requested);
        cached.direction = step.next;
        cached.score += step.delta;
        Ok((step, *cached))
    }

    /// Replace every entry with authoritative values.
    ///
    /// One entry per item in `scores`; directions for items missing from
    /// `scores` are ignored. Any optimistic state, confirmed or not, is
    /// discarded.
    pub fn reconcile(&self, view: &VoteView, scores: &HashMap<ItemId, i64>) {
        let fresh: HashMap<ItemId, Entry> = scores
            .iter()
            .map(|(item, score)| {
                let cached = CachedVote {
                    direction: view.get(item).copied(),
                    score: *score,
                };
                (item.clone(), Arc::new(Mutex::new(cached)))
            })
            .collect();
        let mut entries = self.lock_entries();
        debug!(
            viewer = %self.viewer,
            replaced = entries.len(),
            loaded = fresh.len(),
            "reconciled vote cache"
        );
        *entries = fresh;
    }

    /// Overwrite a single entry with authoritative values (detail view reload).
    pub fn reconcile_one(&self, item: &ItemId, direction: Option<Direction>, score: i64) {
        let entry = self.entry_or_default(item);
        *lock(&entry) = CachedVote { direction, score };
    }

    /// Drop an item (e.g. after it was deleted).
    pub fn evict(&self, item: &ItemId) -> Option<CachedVote> {
        self.lock_entries().remove(item).map(|entry| *lock(&entry))
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    /// Current local state for `item`.
    pub fn get(&self, item: &ItemId) -> Option<CachedVote> {
        self.entry(item).map(|entry| *lock(&entry))
    }

    /// Current local votes.
    pub fn view(&self) -> VoteView {
        self.lock_entries()
            .iter()
            .filter_map(|(item, entry)| lock(entry).direction.map(|d| (item.clone(), d)))
            .collect()
    }

    /// Current local scores.
    pub fn scores(&self) -> HashMap<ItemId, i64> {
        self.lock_entries()
            .iter()
            .map(|(item, entry)| (item.clone(), lock(entry).score))
            .collect()
    }

    /// Ordered copy of every entry, for display and comparison.
    pub fn entries(&self) -> BTreeMap<ItemId, CachedVote> {
        self.lock_entries()
            .iter()
            .map(|(item, entry)| (item.clone(), *lock(entry)))
            .collect()
    }

    /// Number of cached items.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn entry(&self, item: &ItemId) -> Option<Entry> {
        self.lock_entries().get(item).cloned()
    }

    fn entry_or_default(&self, item: &ItemId) -> Entry {
        self.lock_entries().entry(item.clone()).or_default().clone()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<ItemId, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn lock(entry: &Entry) -> MutexGuard<'_, CachedVote> {
    entry.lock().unwrap_or_else(|e| e.into_inner())
}
