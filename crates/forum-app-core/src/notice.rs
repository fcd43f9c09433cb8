// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! User-facing notice queue with TTL + dedupe.
//!
//! Vote handling never blocks on a dialog. Sign-in prompts and "vote not
//! saved" warnings are queued here and rendered by whatever UI is attached.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use forum_vote_core::ItemId;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational note.
    Info,
    /// Action needed from the viewer (e.g. sign in).
    Prompt,
    /// Something failed but the UI keeps going.
    Warn,
}

/// Identifier for a queued notice.
pub type NoticeId = u64;

/// A queued notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Stable identifier.
    pub id: NoticeId,
    /// Severity.
    pub kind: NoticeKind,
    /// Item the notice is about, if any.
    pub item: Option<ItemId>,
    /// Text shown to the viewer.
    pub message: String,
    /// Time-to-live.
    pub ttl: Duration,
    /// Creation (or last refresh) time.
    pub created: Instant,
}

impl Notice {
    /// Prompt shown when an anonymous viewer tries to vote.
    pub const SIGN_IN_TO_VOTE: &'static str = "Please sign in to vote";
    /// Warning shown when a vote write failed; the next refresh corrects it.
    pub const VOTE_NOT_SAVED: &'static str = "Vote not saved; it will correct on next refresh";

    /// Fraction of the lifetime left at `now`: 1.0 fresh, 0.0 expired.
    pub fn remaining(&self, now: Instant) -> f32 {
        let age = now.saturating_duration_since(self.created).as_secs_f32();
        let ttl = self.ttl.as_secs_f32();
        if ttl <= 0.0 {
            return 0.0;
        }
        (1.0 - age / ttl).clamp(0.0, 1.0)
    }

    fn alive(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) < self.ttl
    }
}

/// Bounded notice queue. Identical notices raised within the dedupe window
/// refresh the existing entry instead of stacking.
pub struct NoticeQueue {
    queue: VecDeque<Notice>,
    max: usize,
    dedupe_window: Duration,
    next_id: NoticeId,
}

impl NoticeQueue {
    /// Create a queue holding at most `max` notices.
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Queue a notice and return its id.
    pub fn push(
        &mut self,
        kind: NoticeKind,
        item: Option<ItemId>,
        message: impl Into<String>,
        ttl: Duration,
        now: Instant,
    ) -> NoticeId {
        let message = message.into();
        let window = self.dedupe_window;
        if let Some(existing) = self.queue.iter_mut().find(|n| {
            n.kind == kind
                && n.item == item
                && n.message == message
                && now.saturating_duration_since(n.created) <= window
        }) {
            existing.created = now;
            existing.ttl = ttl;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Notice {
            id,
            kind,
            item,
            message,
            ttl,
            created: now,
        });
        id
    }

    /// Drop expired notices.
    pub fn retain_visible(&mut self, now: Instant) {
        self.queue.retain(|n| n.alive(now));
    }

    /// Notices still visible at `now`, oldest first.
    pub fn visible(&self, now: Instant) -> Vec<Notice> {
        self.queue.iter().filter(|n| n.alive(now)).cloned().collect()
    }

    /// Number of queued notices, expired or not.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(4);

    #[test]
    fn identical_prompts_within_window_collapse() {
        let mut q = NoticeQueue::new(8);
        let t0 = Instant::now();
        let a = q.push(NoticeKind::Prompt, None, Notice::SIGN_IN_TO_VOTE, TTL, t0);
        let b = q.push(
            NoticeKind::Prompt,
            None,
            Notice::SIGN_IN_TO_VOTE,
            TTL,
            t0 + Duration::from_millis(100),
        );
        assert_eq!(a, b);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn same_message_for_different_items_stacks() {
        let mut q = NoticeQueue::new(8);
        let t0 = Instant::now();
        q.push(NoticeKind::Warn, Some(ItemId::new("a")), Notice::VOTE_NOT_SAVED, TTL, t0);
        q.push(NoticeKind::Warn, Some(ItemId::new("b")), Notice::VOTE_NOT_SAVED, TTL, t0);
        assert_eq!(q.visible(t0).len(), 2);
    }

    #[test]
    fn oldest_is_dropped_at_capacity() {
        let mut q = NoticeQueue::new(2);
        let t0 = Instant::now();
        let first = q.push(NoticeKind::Info, None, "one", TTL, t0);
        q.push(NoticeKind::Info, None, "two", TTL, t0);
        q.push(NoticeKind::Info, None, "three", TTL, t0);
        let ids: Vec<_> = q.visible(t0).iter().map(|n| n.id).collect();
        assert!(!ids.contains(&first));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn expired_notices_disappear() {
        let mut q = NoticeQueue::new(4);
        let t0 = Instant::now();
        q.push(NoticeKind::Info, None, "short", Duration::from_millis(10), t0);
        let later = t0 + Duration::from_millis(20);
        assert!(q.visible(later).is_empty());
        q.retain_visible(later);
        assert!(q.is_empty());
    }

    #[test]
    fn remaining_counts_down() {
        let mut q = NoticeQueue::new(4);
        let t0 = Instant::now();
        q.push(NoticeKind::Info, None, "x", TTL, t0);
        let n = &q.visible(t0)[0];
        assert!((n.remaining(t0) - 1.0).abs() < f32::EPSILON);
        assert!((n.remaining(t0 + Duration::from_secs(2)) - 0.5).abs() < 0.01);
    }
}
