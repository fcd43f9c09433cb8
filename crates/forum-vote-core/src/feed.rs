// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Feed read path: items joined with the viewer's votes and reply counts.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Direction, Item, ItemId, ItemSource, ReplyCounter, StoreError, UserId, VoteRecordStore,
    VoteView,
};

/// Channel name that means "no channel filter".
pub const ALL_CHANNELS: &str = "All";

/// Feed ordering.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Newest first.
    #[default]
    Recency,
    /// Highest score first, newest first among equal scores.
    Score,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recency" | "new" => Ok(Self::Recency),
            "score" | "top" => Ok(Self::Score),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

/// What to load.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct FeedQuery {
    /// Channel to show; `None` or [`ALL_CHANNELS`] shows every channel.
    #[serde(default)]
    pub channel: Option<String>,
    /// Ordering.
    #[serde(default)]
    pub sort: SortKey,
    /// Case-insensitive substring matched against title or details.
    #[serde(default)]
    pub search: Option<String>,
}

impl FeedQuery {
    /// Every channel, ordered by `sort`.
    pub fn sorted(sort: SortKey) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }

    /// Restrict to a channel.
    pub fn in_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Restrict to items whose title or details contain `needle`.
    pub fn matching(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    /// Channel to pass to the store, with the "All" sentinel removed.
    pub fn channel_filter(&self) -> Option<&str> {
        self.channel
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(ALL_CHANNELS))
    }

    fn admits(&self, item: &Item) -> bool {
        let Some(needle) = self.search.as_deref().map(str::trim) else {
            return true;
        };
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        item.title.to_lowercase().contains(&needle) || item.details.to_lowercase().contains(&needle)
    }
}

/// One feed row.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FeedEntry {
    /// The item, with its authoritative score at query time.
    pub item: Item,
    /// The viewer's vote; always `None` for anonymous viewers.
    pub my_vote: Option<Direction>,
    /// Number of replies.
    pub reply_count: u64,
}

/// An assembled, ordered feed.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Feed {
    /// Viewer the annotations belong to.
    pub viewer: Option<UserId>,
    /// Rows in display order.
    pub entries: Vec<FeedEntry>,
}

impl Feed {
    /// Viewer's votes, keyed by item.
    pub fn view(&self) -> VoteView {
        self.entries
            .iter()
            .filter_map(|e| e.my_vote.map(|d| (e.item.id.clone(), d)))
            .collect()
    }

    /// Item scores, keyed by item.
    pub fn scores(&self) -> HashMap<ItemId, i64> {
        self.entries
            .iter()
            .map(|e| (e.item.id.clone(), e.item.score))
            .collect()
    }

    /// Item ids in display order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.entries.iter().map(|e| e.item.id.clone()).collect()
    }
}

/// Order entries for display.
///
/// `Recency`: `created_at` descending. `Score`: `score` descending, then
/// `created_at` descending. Remaining ties fall back to item id ascending so
/// the order is total.
pub fn sort_entries(entries: &mut [FeedEntry], sort: SortKey) {
    let newest_first =
        |a: &FeedEntry, b: &FeedEntry| b.item.created_at.cmp(&a.item.created_at);
    let by_id = |a: &FeedEntry, b: &FeedEntry| a.item.id.cmp(&b.item.id);
    entries.sort_by(|a, b| {
        let primary = match sort {
            SortKey::Recency => Ordering::Equal,
            SortKey::Score => b.item.score.cmp(&a.item.score),
        };
        primary
            .then_with(|| newest_first(a, b))
            .then_with(|| by_id(a, b))
    });
}

/// Builds feeds from the item, vote, and reply stores.
pub struct FeedAssembler<B> {
    backend: Arc<B>,
}

impl<B> Clone for FeedAssembler<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B> FeedAssembler<B>
where
    B: ItemSource + VoteRecordStore + ReplyCounter,
{
    /// Assemble over `backend`.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Load the feed for `query` as seen by `viewer`.
    ///
    /// Anonymous viewers get no vote lookup and `None` on every row.
    pub async fn load(
        &self,
        query: &FeedQuery,
        viewer: Option<&UserId>,
    ) -> Result<Feed, StoreError> {
        let items: Vec<Item> = self
            .backend
            .items(query.channel_filter())
            .await?
            .into_iter()
            .filter(|item| query.admits(item))
            .collect();
        let ids: Vec<ItemId> = items.iter().map(|i| i.id.clone()).collect();

        let replies = self.backend.reply_counts(&ids).await?;
        let votes = match viewer {
            Some(user) => self.backend.votes_for(user, &ids).await?,
            None => VoteView::new(),
        };

        let mut entries: Vec<FeedEntry> = items
            .into_iter()
            .map(|item| FeedEntry {
                my_vote: votes.get(&item.id).copied(),
                reply_count: replies.get(&item.id).copied().unwrap_or(0),
                item,
            })
            .collect();
        sort_entries(&mut entries, query.sort);
        debug!(
            channel = query.channel_filter().unwrap_or(ALL_CHANNELS),
            sort = ?query.sort,
            rows = entries.len(),
            anonymous = viewer.is_none(),
            "assembled feed"
        );

        Ok(Feed {
            viewer: viewer.cloned(),
            entries,
        })
    }

    /// Load a single item with the viewer's vote and its reply count.
    pub async fn load_item(
        &self,
        id: &ItemId,
        viewer: Option<&UserId>,
    ) -> Result<Option<FeedEntry>, StoreError> {
        let Some(item) = self.backend.item(id).await? else {
            return Ok(None);
        };
        let my_vote = match viewer {
            Some(user) => self.backend.vote(user, id).await?,
            None => None,
        };
        let reply_count = self
            .backend
            .reply_counts(std::slice::from_ref(id))
            .await?
            .get(id)
            .copied()
            .unwrap_or(0);
        Ok(Some(FeedEntry {
            item,
            my_vote,
            reply_count,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{MemoryBackend, Timestamp};

    fn entry(id: &str, score: i64, created: i64) -> FeedEntry {
        FeedEntry {
            item: Item {
                id: ItemId::new(id),
                title: id.to_owned(),
                details: String::new(),
                channel: "General".into(),
                author: UserId::new("author"),
                created_at: Timestamp(created),
                score,
            },
            my_vote: None,
            reply_count: 0,
        }
    }

    fn ids(entries: &[FeedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.item.id.as_str()).collect()
    }

    #[test]
    fn recency_sorts_newest_first() {
        let mut rows = vec![entry("a", 9, 1), entry("b", 0, 3), entry("c", 5, 2)];
        sort_entries(&mut rows, SortKey::Recency);
        assert_eq!(ids(&rows), ["b", "c", "a"]);
    }

    #[test]
    fn score_ties_break_newest_first() {
        let mut rows = vec![entry("t1", 5, 100), entry("t2", 5, 200), entry("top", 8, 1)];
        sort_entries(&mut rows, SortKey::Score);
        assert_eq!(ids(&rows), ["top", "t2", "t1"]);
    }

    #[test]
    fn full_ties_break_by_id() {
        let mut rows = vec![entry("b", 1, 1), entry("a", 1, 1)];
        sort_entries(&mut rows, SortKey::Score);
        assert_eq!(ids(&rows), ["a", "b"]);
    }

    #[test]
    fn all_channel_sentinel_means_no_filter() {
        assert_eq!(FeedQuery::default().channel_filter(), None);
        assert_eq!(FeedQuery::default().in_channel("all").channel_filter(), None);
        assert_eq!(
            FeedQuery::default().in_channel("Civil").channel_filter(),
            Some("Civil")
        );
    }

    #[test]
    fn sort_key_accepts_ui_names() {
        assert_eq!("new".parse::<SortKey>().unwrap(), SortKey::Recency);
        assert_eq!("Top".parse::<SortKey>().unwrap(), SortKey::Score);
        assert!("hot".parse::<SortKey>().is_err());
    }

    #[tokio::test]
    async fn search_matches_title_or_details_case_insensitively() {
        let backend = Arc::new(MemoryBackend::new());
        let mut a = entry("a", 0, 1).item;
        a.title = "Where is the Library?".into();
        let mut b = entry("b", 0, 2).item;
        b.details = "library hours on sunday".into();
        let c = entry("c", 0, 3).item;
        for item in [a, b, c] {
            backend.insert_item(item);
        }
        let feed = FeedAssembler::new(backend)
            .load(&FeedQuery::default().matching("LIBRARY"), None)
            .await
            .unwrap();
        assert_eq!(feed.ids(), [ItemId::new("b"), ItemId::new("a")]);
    }

    #[tokio::test]
    async fn load_item_reports_missing_as_none() {
        let assembler = FeedAssembler::new(Arc::new(MemoryBackend::new()));
        let got = assembler
            .load_item(&ItemId::new("nope"), Some(&UserId::new("u")))
            .await
            .unwrap();
        assert!(got.is_none());
    }
}
