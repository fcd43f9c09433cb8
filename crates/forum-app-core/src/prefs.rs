// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved feed preferences (default channel, sort, notice lifetime).

use std::time::Duration;

use forum_vote_core::{FeedQuery, SortKey, ALL_CHANNELS};
use serde::{Deserialize, Serialize};

/// Config key under which [`FeedPrefs`] are stored.
pub const FEED_PREFS_KEY: &str = "feed_prefs";

/// Channels offered by the feed sidebar, "All" first.
pub const CHANNELS: [&str; 9] = [
    ALL_CHANNELS,
    "General",
    "CS Related",
    "Electronics Related",
    "Mechanical",
    "Civil",
    "Biotech",
    "Industrial Management",
    "Chemical",
];

/// Saved preferences for the discussion feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedPrefs {
    /// Channel selected on first load.
    pub channel: String,
    /// Sort selected on first load.
    pub sort: SortKey,
    /// How long a notice stays visible, in milliseconds.
    pub notice_ttl_ms: u64,
}

impl Default for FeedPrefs {
    fn default() -> Self {
        Self {
            channel: ALL_CHANNELS.to_owned(),
            sort: SortKey::Recency,
            notice_ttl_ms: 4_000,
        }
    }
}

impl FeedPrefs {
    /// Starting query for the feed.
    pub fn query(&self) -> FeedQuery {
        FeedQuery {
            channel: Some(self.channel.clone()),
            sort: self.sort,
            search: None,
        }
    }

    /// Notice lifetime as a [`Duration`].
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}
