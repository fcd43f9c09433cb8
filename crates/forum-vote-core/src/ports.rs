// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Store ports consumed by the vote subsystem.
//!
//! Each port is a separate trait because the hosted backend exposes them as
//! separate operations with no transaction spanning them. A vote action issues
//! one [`VoteRecordStore`] write and one [`AggregateCounter::add_delta`]; either
//! may fail on its own.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{Direction, Item, ItemId, StoreError, UserId};

/// Per-user vote rows keyed by `(user, item)`. At most one row per key.
#[async_trait]
pub trait VoteRecordStore: Send + Sync {
    /// Create or overwrite the row for `(user, item)`.
    async fn upsert_vote(
        &self,
        user: &UserId,
        item: &ItemId,
        direction: Direction,
    ) -> Result<(), StoreError>;

    /// Remove the row for `(user, item)`. Removing a missing row is a no-op.
    async fn delete_vote(&self, user: &UserId, item: &ItemId) -> Result<(), StoreError>;

    /// Point lookup. `None` means "no vote".
    async fn vote(&self, user: &UserId, item: &ItemId) -> Result<Option<Direction>, StoreError>;

    /// Bulk lookup for feed assembly. Items without a row are absent from the map.
    async fn votes_for(
        &self,
        user: &UserId,
        items: &[ItemId],
    ) -> Result<HashMap<ItemId, Direction>, StoreError>;

    /// Remove every row that references `item`. Returns the number removed.
    async fn delete_votes_for_item(&self, item: &ItemId) -> Result<usize, StoreError>;
}

/// Atomic server-side score adjustment.
///
/// Implementations must apply the delta as a single add, never as
/// read-then-write, so concurrent voters compose by plain signed addition.
#[async_trait]
pub trait AggregateCounter: Send + Sync {
    /// Add `delta` to the item's score and return the new score.
    async fn add_delta(&self, item: &ItemId, delta: i64) -> Result<i64, StoreError>;
}

/// Read access to items (plus the admin delete used by moderation).
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Items in `channel`, or every item when `channel` is `None`. Unordered.
    async fn items(&self, channel: Option<&str>) -> Result<Vec<Item>, StoreError>;

    /// A single item, if it exists.
    async fn item(&self, id: &ItemId) -> Result<Option<Item>, StoreError>;

    /// Delete the item row. Returns `false` if it did not exist.
    async fn delete_item(&self, id: &ItemId) -> Result<bool, StoreError>;
}

/// Read-only reply counts (plus cascade delete for moderation).
#[async_trait]
pub trait ReplyCounter: Send + Sync {
    /// Reply count per item. Items with no replies may be absent.
    async fn reply_counts(&self, items: &[ItemId]) -> Result<HashMap<ItemId, u64>, StoreError>;

    /// Delete every reply to `item`. Returns the number removed.
    async fn delete_replies(&self, item: &ItemId) -> Result<u64, StoreError>;
}

/// Everything the client needs from the hosted backend.
pub trait ForumBackend: VoteRecordStore + AggregateCounter + ItemSource + ReplyCounter {}

impl<T> ForumBackend for T where T: VoteRecordStore + AggregateCounter + ItemSource + ReplyCounter {}
