// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fault-injecting store for exercising partial writes and in-flight state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use forum_vote_core::{
    AggregateCounter, Direction, Item, ItemId, ItemSource, MemoryBackend, ReplyCounter,
    StoreError, UserId, VoteRecordStore,
};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

/// [`MemoryBackend`] wrapper that can fail or stall individual ports.
///
/// - Record writes (`upsert_vote`, `delete_vote`) and counter adds
///   (`add_delta`) fail independently, so a test can produce either half of a
///   partial write.
/// - [`hold_writes`](Self::hold_writes) parks every write until
///   [`release_writes`](Self::release_writes), which keeps persistence
///   observably pending.
///
/// Reads are never stalled.
///
/// # Example
///
/// ```
/// use forum_dry_tests::{FaultyBackend, ItemBuilder, seeded_backend};
///
/// let backend = FaultyBackend::new(seeded_backend([ItemBuilder::new("q1").build()]));
/// backend.fail_counter_adds(true);
/// assert_eq!(backend.counter_adds(), 0);
/// ```
pub struct FaultyBackend {
    inner: MemoryBackend,
    fail_records: AtomicBool,
    fail_counter: AtomicBool,
    fail_reads: AtomicBool,
    record_writes: AtomicUsize,
    counter_adds: AtomicUsize,
    gate: Arc<RwLock<()>>,
    held: Mutex<Option<OwnedRwLockWriteGuard<()>>>,
}

impl FaultyBackend {
    /// Wrap `inner` with every fault disabled.
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            fail_records: AtomicBool::new(false),
            fail_counter: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            record_writes: AtomicUsize::new(0),
            counter_adds: AtomicUsize::new(0),
            gate: Arc::new(RwLock::new(())),
            held: Mutex::new(None),
        }
    }

    /// The wrapped store, for direct inspection.
    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    /// Make `upsert_vote` and `delete_vote` fail.
    pub fn fail_record_writes(&self, fail: bool) {
        self.fail_records.store(fail, Ordering::SeqCst);
    }

    /// Make `add_delta` fail.
    pub fn fail_counter_adds(&self, fail: bool) {
        self.fail_counter.store(fail, Ordering::SeqCst);
    }

    /// Make item, vote, and reply reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Record write attempts so far, including failed ones.
    pub fn record_writes(&self) -> usize {
        self.record_writes.load(Ordering::SeqCst)
    }

    /// Counter add attempts so far, including failed ones.
    pub fn counter_adds(&self) -> usize {
        self.counter_adds.load(Ordering::SeqCst)
    }

    /// Park every subsequent write until [`release_writes`](Self::release_writes).
    ///
    /// Returns `false` if the gate could not be closed because writes are
    /// currently passing through it, or it is already held.
    pub fn hold_writes(&self) -> bool {
        let mut held = self.held();
        if held.is_some() {
            return false;
        }
        match Arc::clone(&self.gate).try_write_owned() {
            Ok(guard) => {
                *held = Some(guard);
                true
            }
            Err(_) => false,
        }
    }

    /// Let parked and future writes through.
    pub fn release_writes(&self) {
        self.held().take();
    }

    async fn record_write(&self) -> Result<(), StoreError> {
        let _open = self.gate.read().await;
        self.record_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("vote record write rejected".into()));
        }
        Ok(())
    }

    fn read_check(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read rejected".into()));
        }
        Ok(())
    }

    fn held(&self) -> MutexGuard<'_, Option<OwnedRwLockWriteGuard<()>>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VoteRecordStore for FaultyBackend {
    async fn upsert_vote(
        &self,
        user: &UserId,
        item: &ItemId,
        direction: Direction,
    ) -> Result<(), StoreError> {
        self.record_write().await?;
        self.inner.upsert_vote(user, item, direction).await
    }

    async fn delete_vote(&self, user: &UserId, item: &ItemId) -> Result<(), StoreError> {
        self.record_write().await?;
        self.inner.delete_vote(user, item).await
    }

    async fn vote(&self, user: &UserId, item: &ItemId) -> Result<Option<Direction>, StoreError> {
        self.read_check()?;
        self.inner.vote(user, item).await
    }

    async fn votes_for(
        &self,
        user: &UserId,
        items: &[ItemId],
    ) -> Result<HashMap<ItemId, Direction>, StoreError> {
        self.read_check()?;
        self.inner.votes_for(user, items).await
    }

    async fn delete_votes_for_item(&self, item: &ItemId) -> Result<usize, StoreError> {
        self.inner.delete_votes_for_item(item).await
    }
}

#[async_trait]
impl AggregateCounter for FaultyBackend {
    async fn add_delta(&self, item: &ItemId, delta: i64) -> Result<i64, StoreError> {
        let _open = self.gate.read().await;
        self.counter_adds.fetch_add(1, Ordering::SeqCst);
        if self.fail_counter.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("score adjustment rejected".into()));
        }
        self.inner.add_delta(item, delta).await
    }
}

#[async_trait]
impl ItemSource for FaultyBackend {
    async fn items(&self, channel: Option<&str>) -> Result<Vec<Item>, StoreError> {
        self.read_check()?;
        self.inner.items(channel).await
    }

    async fn item(&self, id: &ItemId) -> Result<Option<Item>, StoreError> {
        self.read_check()?;
        self.inner.item(id).await
    }

    async fn delete_item(&self, id: &ItemId) -> Result<bool, StoreError> {
        self.inner.delete_item(id).await
    }
}

#[async_trait]
impl ReplyCounter for FaultyBackend {
    async fn reply_counts(&self, items: &[ItemId]) -> Result<HashMap<ItemId, u64>, StoreError> {
        self.read_check()?;
        self.inner.reply_counts(items).await
    }

    async fn delete_replies(&self, item: &ItemId) -> Result<u64, StoreError> {
        self.inner.delete_replies(item).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{seeded_backend, ItemBuilder};
    use std::time::Duration;

    fn backend() -> Arc<FaultyBackend> {
        Arc::new(FaultyBackend::new(seeded_backend([ItemBuilder::new("q1")
            .score(3)
            .build()])))
    }

    #[tokio::test]
    async fn record_and_counter_fail_independently() {
        let store = backend();
        let (u, q) = (UserId::new("a"), ItemId::new("q1"));

        store.fail_record_writes(true);
        assert!(store.upsert_vote(&u, &q, Direction::Up).await.is_err());
        assert_eq!(store.add_delta(&q, 1).await.unwrap(), 4);

        store.fail_record_writes(false);
        store.fail_counter_adds(true);
        store.upsert_vote(&u, &q, Direction::Up).await.unwrap();
        assert!(store.add_delta(&q, 1).await.is_err());

        assert_eq!(store.inner().score_of(&q), Some(4));
        assert_eq!(store.inner().vote_count(), 1);
        assert_eq!(store.record_writes(), 2);
        assert_eq!(store.counter_adds(), 2);
    }

    #[tokio::test]
    async fn read_faults_leave_writes_alone() {
        let store = backend();
        store.fail_reads(true);
        assert!(store.items(None).await.is_err());
        assert!(store.add_delta(&ItemId::new("q1"), -1).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn held_writes_wait_for_release() {
        let store = backend();
        assert!(store.hold_writes());
        assert!(!store.hold_writes());

        let task = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.add_delta(&ItemId::new("q1"), 1).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());
        assert_eq!(store.inner().score_of(&ItemId::new("q1")), Some(3));

        store.release_writes();
        assert_eq!(task.await.unwrap().unwrap(), 4);
    }
}
