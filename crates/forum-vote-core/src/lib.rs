// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vote aggregation core for the campus forum.
//!
//! Every question carries one integer score, and every signed-in user may hold at
//! most one vote (up or down) per question. This crate owns the pieces that keep
//! those two facts consistent:
//!
//! - [`transition`]: the pure vote state machine (previous vote + requested
//!   action ⇒ next vote + signed score delta).
//! - [`ClientVoteCache`]: the optimistic per-viewer mirror of "my vote" and
//!   "item score", corrected wholesale by [`ClientVoteCache::reconcile`].
//! - [`FeedAssembler`]: the read path joining items, the viewer's votes, and
//!   reply counts under a deterministic sort.
//! - Store ports ([`VoteRecordStore`], [`AggregateCounter`], [`ItemSource`],
//!   [`ReplyCounter`]) plus [`MemoryBackend`], an in-process implementation.
//!
//! # Consistency Model
//!
//! At rest, an item's score equals its up-vote rows minus its down-vote rows.
//! The vote-row write and the score adjustment are independent operations and
//! may partially fail; the next feed load is the repair point. Store failures
//! are never retried here and optimistic state is never rolled back. The
//! [`audit`] module reports drift between rows and scores.
#![forbid(unsafe_code)]

pub mod audit;
mod cache;
mod engine;
mod error;
mod feed;
mod memory;
mod ports;

pub use cache::{CachedVote, ClientVoteCache, VoteView};
pub use engine::{transition, Transition, TransitionKind};
pub use error::{StoreError, VoteError};
pub use feed::{sort_entries, Feed, FeedAssembler, FeedEntry, FeedQuery, SortKey, ALL_CHANNELS};
pub use memory::{MemoryBackend, MemorySnapshot, ReplyTally};
pub use ports::{AggregateCounter, ForumBackend, ItemSource, ReplyCounter, VoteRecordStore};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a signed-in user.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Opaque identifier of a content item (a question).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            /// Build an identifier from anything string-like.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }
    };
}

string_id!(UserId);
string_id!(ItemId);

/// Creation time in milliseconds since the Unix epoch.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

/// A non-neutral vote direction.
///
/// Also the type of a requested vote action: callers can only ask for `Up` or
/// `Down`, so the state machine has no invalid inputs. "No vote" is modelled as
/// `Option::<Direction>::None` everywhere.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Up-vote, worth +1.
    Up,
    /// Down-vote, worth −1.
    Down,
}

impl Direction {
    /// Score contribution of a single vote in this direction.
    pub fn weight(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// The other direction.
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    /// Score contribution of an optional vote (`None` contributes 0).
    pub fn weight_of(vote: Option<Self>) -> i64 {
        vote.map_or(0, Self::weight)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "+" => Ok(Self::Up),
            "down" | "-" => Ok(Self::Down),
            other => Err(format!("unknown vote direction: {other}")),
        }
    }
}

/// A question as seen by the vote subsystem.
///
/// `score` is owned by the content store and only ever changes through
/// [`AggregateCounter::add_delta`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier.
    pub id: ItemId,
    /// Headline shown in the feed.
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub details: String,
    /// Discussion channel (e.g. "General", "CS Related").
    pub channel: String,
    /// Author of the question.
    pub author: UserId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Aggregate score: up-votes minus down-votes, at rest.
    #[serde(default)]
    pub score: i64,
}

/// One persisted vote row. Its existence encodes a non-neutral vote.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Voter.
    pub user: UserId,
    /// Voted item.
    pub item: ItemId,
    /// Stored direction.
    pub direction: Direction,
}

/// The signed-in viewer on whose behalf reads and votes are made.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Viewer {
    /// Identity from the session provider.
    pub user: UserId,
    /// Admins may delete items.
    #[serde(default)]
    pub is_admin: bool,
}

impl Viewer {
    /// A regular (non-admin) viewer.
    pub fn member(user: impl Into<String>) -> Self {
        Self {
            user: UserId::new(user),
            is_admin: false,
        }
    }

    /// An admin viewer.
    pub fn admin(user: impl Into<String>) -> Self {
        Self {
            user: UserId::new(user),
            is_admin: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn direction_weights_are_unit_and_signed() {
        assert_eq!(Direction::Up.weight(), 1);
        assert_eq!(Direction::Down.weight(), -1);
        assert_eq!(Direction::weight_of(None), 0);
        assert_eq!(Direction::Up.opposite(), Direction::Down);
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!(" down ".parse::<Direction>().unwrap(), Direction::Down);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn direction_serializes_lowercase() {
        let json = serde_json::to_string(&Direction::Down).unwrap();
        assert_eq!(json, "\"down\"");
    }

    #[test]
    fn item_defaults_missing_score_to_zero() {
        let item: Item = serde_json::from_str(
            r#"{"id":"q1","title":"t","channel":"General","author":"u","created_at":5}"#,
        )
        .unwrap();
        assert_eq!(item.score, 0);
        assert_eq!(item.details, "");
        assert_eq!(item.id.as_str(), "q1");
    }
}
