// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Background persistence of a vote action.
//!
//! Each action issues its row write and its score delta concurrently. Neither
//! is retried and neither waits for the other's outcome. Actions on the same
//! item by the same client are chained so rows reach the store in call order.

use std::sync::Arc;

use forum_vote_core::{
    AggregateCounter, ItemId, StoreError, Transition, UserId, VoteRecordStore,
};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Which halves of a vote write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFailure {
    /// Row upsert/delete error, if it failed.
    pub record: Option<StoreError>,
    /// Score delta error, if it failed.
    pub counter: Option<StoreError>,
}

/// Persistence state of one vote action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
    /// Writes still in flight.
    Pending,
    /// Both writes landed.
    Confirmed,
    /// At least one write failed. The optimistic state is left in place.
    Failed(PersistFailure),
}

impl PersistStatus {
    /// Returns `true` while writes are in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Watch handle on a vote action's background writes.
#[derive(Debug, Clone)]
pub struct PersistHandle {
    rx: watch::Receiver<PersistStatus>,
}

impl PersistHandle {
    /// Current status without waiting.
    pub fn status(&self) -> PersistStatus {
        self.rx.borrow().clone()
    }

    /// Returns `true` while writes are in flight.
    pub fn is_pending(&self) -> bool {
        self.rx.borrow().is_pending()
    }

    /// Wait until both writes have completed or failed.
    ///
    /// If the background task is torn down before reporting (runtime
    /// shutdown), the last observed status is returned, which may be `Pending`.
    pub async fn settled(&mut self) -> PersistStatus {
        let settled = self
            .rx
            .wait_for(|s| !s.is_pending())
            .await
            .map(|s| s.clone());
        settled.unwrap_or_else(|_| self.rx.borrow().clone())
    }
}

/// Issue the row write and the score delta for `step`, concurrently.
pub async fn persist_transition<B>(
    backend: &B,
    user: &UserId,
    item: &ItemId,
    step: Transition,
) -> PersistStatus
where
    B: VoteRecordStore + AggregateCounter + ?Sized,
{
    let record = async {
        match step.next {
            Some(direction) => backend.upsert_vote(user, item, direction).await,
            None => backend.delete_vote(user, item).await,
        }
    };
    let counter = backend.add_delta(item, step.delta);
    let (record, counter) = tokio::join!(record, counter);

    match (record, counter) {
        (Ok(()), Ok(score)) => {
            debug!(%item, delta = step.delta, score, "vote persisted");
            PersistStatus::Confirmed
        }
        (record, counter) => {
            let failure = PersistFailure {
                record: record.err(),
                counter: counter.err(),
            };
            warn!(
                %item,
                delta = step.delta,
                record_error = ?failure.record,
                counter_error = ?failure.counter,
                "vote write failed; left for next feed reconciliation"
            );
            PersistStatus::Failed(failure)
        }
    }
}

/// Spawn [`persist_transition`] after `previous` (the prior action on the same
/// item) has settled. `on_failure` runs in the task if any write fails.
///
/// Must be called from within a Tokio runtime.
pub(crate) fn spawn_persist<B, F>(
    backend: Arc<B>,
    user: UserId,
    item: ItemId,
    step: Transition,
    previous: Option<PersistHandle>,
    on_failure: F,
) -> PersistHandle
where
    B: VoteRecordStore + AggregateCounter + 'static,
    F: FnOnce(&ItemId, &PersistFailure) + Send + 'static,
{
    let (tx, rx) = watch::channel(PersistStatus::Pending);
    tokio::spawn(async move {
        if let Some(mut previous) = previous {
            previous.settled().await;
        }
        let status = persist_transition(backend.as_ref(), &user, &item, step).await;
        if let PersistStatus::Failed(failure) = &status {
            on_failure(&item, failure);
        }
        tx.send_replace(status);
    });
    PersistHandle { rx }
}
