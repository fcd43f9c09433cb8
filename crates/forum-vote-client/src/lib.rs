// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vote and feed client for the campus forum.
//!
//! [`VoteClient`] is what a UI talks to. A vote click goes through
//! [`VoteClient::cast_vote`]: it updates the viewer's cache synchronously and
//! returns at once with a [`PersistHandle`] for the background writes. A feed
//! load goes through [`VoteClient::load_feed`], whose result overwrites the
//! cache, including any optimistic state that never made it to the store.

mod persist;

pub use persist::{persist_transition, PersistFailure, PersistHandle, PersistStatus};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use forum_app_core::notice::{Notice, NoticeKind, NoticeQueue};
use forum_app_core::prefs::FeedPrefs;
use forum_vote_core::{
    ClientVoteCache, Direction, Feed, FeedAssembler, FeedEntry, FeedQuery, ForumBackend, ItemId,
    Transition, Viewer, VoteError,
};
use tracing::{info, instrument, warn};

/// Result of a vote click, available before the store confirms it.
#[derive(Debug, Clone)]
pub struct CastOutcome {
    /// Voted item.
    pub item: ItemId,
    /// State machine step that was applied locally.
    pub transition: Transition,
    /// Score now displayed for the item.
    pub score: i64,
    /// Background write status.
    pub persistence: PersistHandle,
}

impl CastOutcome {
    /// Vote now displayed for the item.
    pub fn direction(&self) -> Option<Direction> {
        self.transition.next
    }
}

#[derive(Clone)]
struct Session {
    viewer: Viewer,
    cache: Arc<ClientVoteCache>,
}

/// Client-side entry points for voting and feed loading.
///
/// Holds at most one viewer session. Each session owns a fresh
/// [`ClientVoteCache`]; ending the session drops it.
pub struct VoteClient<B> {
    backend: Arc<B>,
    feeds: FeedAssembler<B>,
    session: RwLock<Option<Session>>,
    in_flight: Mutex<HashMap<ItemId, PersistHandle>>,
    notices: Arc<Mutex<NoticeQueue>>,
    notice_ttl: Duration,
}

impl<B> VoteClient<B>
where
    B: ForumBackend + 'static,
{
    /// Create an anonymous client over `backend` with default preferences.
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_prefs(backend, &FeedPrefs::default())
    }

    /// Create an anonymous client over `backend`.
    pub fn with_prefs(backend: Arc<B>, prefs: &FeedPrefs) -> Self {
        Self {
            feeds: FeedAssembler::new(Arc::clone(&backend)),
            backend,
            session: RwLock::new(None),
            in_flight: Mutex::new(HashMap::new()),
            notices: Arc::new(Mutex::new(NoticeQueue::default())),
            notice_ttl: prefs.notice_ttl(),
        }
    }

    /// Start a session for `viewer` with an empty cache, replacing any
    /// previous session.
    pub fn begin_session(&self, viewer: Viewer) {
        info!(viewer = %viewer.user, admin = viewer.is_admin, "session started");
        let cache = Arc::new(ClientVoteCache::new(viewer.user.clone()));
        *self.write_session() = Some(Session { viewer, cache });
    }

    /// End the current session and drop its cache.
    pub fn end_session(&self) {
        if let Some(session) = self.write_session().take() {
            session.cache.clear();
            info!(viewer = %session.viewer.user, "session ended");
        }
        lock_or_recover(&self.in_flight).clear();
    }

    /// The signed-in viewer, if any.
    pub fn viewer(&self) -> Option<Viewer> {
        self.current().map(|s| s.viewer)
    }

    /// The current session's cache, if signed in.
    pub fn cache(&self) -> Option<Arc<ClientVoteCache>> {
        self.current().map(|s| s.cache)
    }

    /// Apply a vote click.
    ///
    /// Rejects anonymous viewers locally (queuing a sign-in prompt) and items
    /// not present in the current view. Otherwise the transition is computed
    /// from the cached vote, applied to the cache, and persisted in the
    /// background. Store failures are reported through the returned handle
    /// and a notice; the local state is not rolled back.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self, item), fields(item = %item))]
    pub fn cast_vote(&self, item: &ItemId, direction: Direction) -> Result<CastOutcome, VoteError> {
        let Some(session) = self.current() else {
            self.notify(NoticeKind::Prompt, Some(item.clone()), Notice::SIGN_IN_TO_VOTE);
            return Err(VoteError::SignInRequired);
        };

        let mut in_flight = lock_or_recover(&self.in_flight);
        let (step, local) = session.cache.apply_action(item, direction)?;
        let notices = Arc::clone(&self.notices);
        let ttl = self.notice_ttl;
        let persistence = persist::spawn_persist(
            Arc::clone(&self.backend),
            session.viewer.user.clone(),
            item.clone(),
            step,
            in_flight.get(item).cloned(),
            move |item, _failure| {
                lock_or_recover(&notices).push(
                    NoticeKind::Warn,
                    Some(item.clone()),
                    Notice::VOTE_NOT_SAVED,
                    ttl,
                    Instant::now(),
                );
            },
        );
        in_flight.insert(item.clone(), persistence.clone());
        drop(in_flight);

        info!(
            previous = ?step.previous,
            next = ?step.next,
            delta = step.delta,
            score = local.score,
            "vote applied optimistically"
        );
        Ok(CastOutcome {
            item: item.clone(),
            transition: step,
            score: local.score,
            persistence,
        })
    }

    /// Load the feed and reconcile the viewer's cache with it.
    ///
    /// The reconciliation replaces the whole cache, discarding optimistic
    /// state whether or not its writes have landed.
    #[instrument(skip(self, query), fields(sort = ?query.sort))]
    pub async fn load_feed(&self, query: &FeedQuery) -> Result<Feed, VoteError> {
        let session = self.current();
        let viewer = session.as_ref().map(|s| &s.viewer.user);
        let feed = self.feeds.load(query, viewer).await.map_err(|err| {
            warn!(%err, "feed load failed");
            VoteError::from(err)
        })?;
        if let Some(session) = &session {
            session.cache.reconcile(&feed.view(), &feed.scores());
        }
        Ok(feed)
    }

    /// Load one item (detail view) and reconcile its cache entry.
    #[instrument(skip(self, item), fields(item = %item))]
    pub async fn load_item(&self, item: &ItemId) -> Result<Option<FeedEntry>, VoteError> {
        let session = self.current();
        let viewer = session.as_ref().map(|s| &s.viewer.user);
        let entry = self.feeds.load_item(item, viewer).await?;
        if let Some(session) = &session {
            match &entry {
                Some(e) => session.cache.reconcile_one(item, e.my_vote, e.item.score),
                None => {
                    session.cache.evict(item);
                }
            }
        }
        Ok(entry)
    }

    /// Delete an item with its votes and replies. Admins only.
    ///
    /// Cascades votes, then replies, then the item. Returns `false` if the item
    /// was already gone.
    #[instrument(skip(self, item), fields(item = %item))]
    pub async fn delete_item(&self, item: &ItemId) -> Result<bool, VoteError> {
        let Some(session) = self.current() else {
            return Err(VoteError::SignInRequired);
        };
        if !session.viewer.is_admin {
            return Err(VoteError::Forbidden("deleting questions requires an admin".into()));
        }
        let votes = self.backend.delete_votes_for_item(item).await?;
        let replies = self.backend.delete_replies(item).await?;
        let existed = self.backend.delete_item(item).await?;
        session.cache.evict(item);
        info!(votes, replies, existed, "item deleted");
        Ok(existed)
    }

    /// Notices still visible now; expired ones are dropped.
    pub fn notices(&self) -> Vec<Notice> {
        let now = Instant::now();
        let mut queue = lock_or_recover(&self.notices);
        queue.retain_visible(now);
        queue.visible(now)
    }

    fn notify(&self, kind: NoticeKind, item: Option<ItemId>, message: &str) {
        lock_or_recover(&self.notices).push(kind, item, message, self.notice_ttl, Instant::now());
    }

    fn current(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn write_session(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
