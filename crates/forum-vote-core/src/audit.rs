// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Score/row consistency checks.
//!
//! A vote writes its row and adjusts the score in two independent store calls.
//! When exactly one of them lands, the stored score and the rows disagree
//! until something repairs it. [`find_drift`] reports the disagreement;
//! [`repair`] issues compensating deltas through the [`AggregateCounter`], so
//! concurrent voters are never clobbered by a direct overwrite.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{AggregateCounter, Item, ItemId, StoreError, VoteRecord};

/// One item whose stored score disagrees with its vote rows.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Drift {
    /// Affected item.
    pub item: ItemId,
    /// Score currently stored on the item.
    pub stored: i64,
    /// Up-rows minus down-rows.
    pub expected: i64,
}

impl Drift {
    /// Delta that brings the stored score back in line with the rows.
    pub fn correction(&self) -> i64 {
        self.expected - self.stored
    }
}

/// Up-rows minus down-rows per item. Items with no rows are absent.
pub fn tally(votes: &[VoteRecord]) -> BTreeMap<ItemId, i64> {
    let mut out = BTreeMap::new();
    for vote in votes {
        *out.entry(vote.item.clone()).or_insert(0) += vote.direction.weight();
    }
    out
}

/// Every item whose score differs from its tally, ordered by item id.
///
/// Rows pointing at items that no longer exist are ignored.
pub fn find_drift(items: &[Item], votes: &[VoteRecord]) -> Vec<Drift> {
    let tallies = tally(votes);
    let mut drift: Vec<Drift> = items
        .iter()
        .filter_map(|item| {
            let expected = tallies.get(&item.id).copied().unwrap_or(0);
            (expected != item.score).then(|| Drift {
                item: item.id.clone(),
                stored: item.score,
                expected,
            })
        })
        .collect();
    drift.sort_by(|a, b| a.item.cmp(&b.item));
    drift
}

/// Apply each drift's correction as a delta. Returns how many items were fixed.
///
/// Stops at the first store failure; already-applied corrections stay applied.
pub async fn repair<C>(counter: &C, drift: &[Drift]) -> Result<usize, StoreError>
where
    C: AggregateCounter + ?Sized,
{
    let mut fixed = 0;
    for d in drift {
        let correction = d.correction();
        if correction == 0 {
            continue;
        }
        match counter.add_delta(&d.item, correction).await {
            Ok(score) => {
                info!(item = %d.item, correction, score, "repaired score drift");
                fixed += 1;
            }
            Err(err) => {
                warn!(item = %d.item, correction, %err, "score repair failed");
                return Err(err);
            }
        }
    }
    Ok(fixed)
}
