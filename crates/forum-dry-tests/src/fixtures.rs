// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Item builders and seeded stores.

use forum_vote_core::{Item, ItemId, MemoryBackend, Timestamp, UserId};

/// Builder for [`Item`] with test-friendly defaults.
///
/// Defaults: channel "General", author "author", score 0, created at 0.
#[derive(Clone, Debug)]
pub struct ItemBuilder {
    item: Item,
}

impl ItemBuilder {
    /// Start a builder for item `id` (also used as the title).
    pub fn new(id: &str) -> Self {
        Self {
            item: Item {
                id: ItemId::new(id),
                title: id.to_owned(),
                details: String::new(),
                channel: "General".to_owned(),
                author: UserId::new("author"),
                created_at: Timestamp(0),
                score: 0,
            },
        }
    }

    /// Set the stored score.
    pub fn score(mut self, score: i64) -> Self {
        self.item.score = score;
        self
    }

    /// Set the creation time (ms since epoch).
    pub fn created_at(mut self, millis: i64) -> Self {
        self.item.created_at = Timestamp(millis);
        self
    }

    /// Set the channel.
    pub fn channel(mut self, channel: &str) -> Self {
        self.item.channel = channel.to_owned();
        self
    }

    /// Set the title.
    pub fn title(mut self, title: &str) -> Self {
        self.item.title = title.to_owned();
        self
    }

    /// Set the details text.
    pub fn details(mut self, details: &str) -> Self {
        self.item.details = details.to_owned();
        self
    }

    /// Finish the item.
    pub fn build(self) -> Item {
        self.item
    }
}

/// A store holding `items`, with no votes and no replies.
pub fn seeded_backend(items: impl IntoIterator<Item = Item>) -> MemoryBackend {
    let backend = MemoryBackend::new();
    for item in items {
        backend.insert_item(item);
    }
    backend
}
