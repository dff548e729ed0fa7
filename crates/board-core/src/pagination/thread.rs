//! Comment thread facade.
//!
//! Binds one thread id to a [`CommentWindow`], a [`ReversalController`] and
//! the shared [`PageCache`]. Every state change happens under one lock as a
//! batch, followed by exactly one [`ThreadSnapshot`] publish, so observers
//! never see the page set and the reversal state out of step.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use anyhow::Result;
use board_types::{Comment, CommentDraft, CommentItem, Direction, LATEST_PAGE, PageNumber};
use tokio::sync::watch;

use super::page_set::PageSet;
use super::placement::{self, Placement};
use super::reversal::{ROLLBACK_DELAY_MS, ReversalController, ReversalId};
use super::window::{CommentWindow, WindowMutation};
use crate::cache::{PageCache, PageKey};
use crate::sources::CommentSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadOptions {
    /// Open anchored at the latest page instead of page 1.
    pub reversed: bool,
    pub rollback_delay: Duration,
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            reversed: false,
            rollback_delay: Duration::from_millis(ROLLBACK_DELAY_MS),
        }
    }
}

/// Everything a view needs to render the thread.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThreadSnapshot {
    pub pages: Vec<PageNumber>,
    pub comments: Vec<CommentItem>,
    pub count: Option<u64>,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub reversing: bool,
    pub reversed: bool,
}

#[derive(Debug)]
struct ThreadState {
    window: CommentWindow,
    reversal: ReversalController,
}

impl ThreadState {
    fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            pages: self.window.pages().to_vec(),
            comments: self.window.comments(),
            count: self.window.count(),
            has_prev_page: self.window.has_prev_page(),
            has_next_page: self.window.has_next_page(),
            reversing: self.reversal.is_pending(),
            reversed: self.window.is_reversed(),
        }
    }
}

struct Shared<S> {
    resource_id: String,
    cache: Arc<PageCache<S>>,
    state: Mutex<ThreadState>,
    snapshots: watch::Sender<ThreadSnapshot>,
}

impl<S: CommentSource> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, ThreadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self, page: PageNumber) -> PageKey {
        PageKey::new(self.resource_id.as_str(), page)
    }

    /// Applies `mutations`, re-reads page results and publishes once.
    fn commit(
        &self,
        state: &mut ThreadState,
        mutations: impl IntoIterator<Item = WindowMutation>,
    ) {
        for mutation in mutations {
            state.window.apply(mutation);
        }
        self.resync(state);
    }

    /// Re-reads page results from the cache and publishes a snapshot.
    fn resync(&self, state: &mut ThreadState) {
        state
            .window
            .sync_results(|page| self.cache.read(&self.key(page)));
        self.snapshots.send_replace(state.snapshot());
    }
}

/// Logs a broken invariant. Debug builds panic; release builds skip the
/// operation that detected it.
fn invariant_violation(message: &str) {
    tracing::error!("comment thread invariant violated: {message}");
    if cfg!(debug_assertions) {
        panic!("{message}");
    }
}

pub struct CommentThread<S> {
    shared: Arc<Shared<S>>,
    rollback_delay: Duration,
}

impl<S: CommentSource> CommentThread<S> {
    /// Opens a thread view. Initial pages are chosen from what the cache
    /// already holds; call [`Self::load`] to fetch them.
    pub fn open(
        cache: Arc<PageCache<S>>,
        resource_id: impl Into<String>,
        options: ThreadOptions,
    ) -> Self {
        let resource_id = resource_id.into();
        let resident = cache.resident_pages(&resource_id);
        let mut window = CommentWindow::initial(cache.page_size(), options.reversed, &resident);
        window.sync_results(|page| cache.read(&PageKey::new(resource_id.as_str(), page)));
        let state = ThreadState {
            window,
            reversal: ReversalController::new(),
        };
        let (snapshots, _) = watch::channel(state.snapshot());
        tracing::debug!(
            resource_id = %resource_id,
            pages = ?state.window.pages(),
            reversed = options.reversed,
            "opened comment thread"
        );

        Self {
            shared: Arc::new(Shared {
                resource_id,
                cache,
                state: Mutex::new(state),
                snapshots,
            }),
            rollback_delay: options.rollback_delay,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.shared.resource_id
    }

    pub fn cache(&self) -> &Arc<PageCache<S>> {
        &self.shared.cache
    }

    /// Fetches the initial pages and resolves the latest-page sentinel.
    ///
    /// # Errors
    /// Returns the first page fetch error; the window keeps its pages.
    pub async fn load(&self) -> Result<()> {
        let keys: Vec<PageKey> = {
            let state = self.shared.lock();
            state.window.pages().iter().map(|page| self.shared.key(page)).collect()
        };
        let fetches = keys.iter().map(|key| self.shared.cache.fetch_if_absent(key));
        futures_util::future::try_join_all(fetches).await?;

        let mut state = self.shared.lock();
        let cache = &self.shared.cache;
        state
            .window
            .sync_results(|page| cache.read(&self.shared.key(page)));
        match state.window.sentinel_target() {
            Some(real_page) => self.resolve_sentinel(&mut state, real_page),
            None => self.shared.resync(&mut state),
        }
        Ok(())
    }

    /// Re-keys the sentinel result under its real page number and swaps the
    /// window over in one batch.
    fn resolve_sentinel(&self, state: &mut ThreadState, real_page: PageNumber) {
        let sentinel = self.shared.key(LATEST_PAGE);
        let Some(result) = self.shared.cache.read(&sentinel) else {
            self.shared.resync(state);
            return;
        };
        self.shared.cache.cancel(&sentinel);
        self.shared
            .cache
            .write(self.shared.key(real_page), move |_| result);
        tracing::debug!(
            resource_id = %self.shared.resource_id,
            real_page,
            "resolved latest page"
        );
        self.shared.commit(
            state,
            [WindowMutation::SetPages(PageSet::single(real_page))],
        );
    }

    pub fn comments(&self) -> Vec<CommentItem> {
        self.shared.lock().window.comments()
    }

    pub fn comments_count(&self) -> Option<u64> {
        self.shared.lock().window.count()
    }

    pub fn has_prev_page(&self) -> bool {
        self.shared.lock().window.has_prev_page()
    }

    pub fn has_next_page(&self) -> bool {
        self.shared.lock().window.has_next_page()
    }

    pub fn is_reversing(&self) -> bool {
        self.shared.lock().reversal.is_pending()
    }

    pub fn is_reversed(&self) -> bool {
        self.shared.lock().window.is_reversed()
    }

    pub fn pages(&self) -> Vec<PageNumber> {
        self.shared.lock().window.pages().to_vec()
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        self.shared.lock().snapshot()
    }

    /// Receiver that always holds the latest published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ThreadSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Re-derives the window from the cache after writes made elsewhere.
    pub fn refresh(&self) {
        let mut state = self.shared.lock();
        self.shared.resync(&mut state);
    }

    /// Extends the window by one page in `direction`.
    ///
    /// Returns the page added, or `None` when the window cannot extend
    /// (boundary reached, fetch outstanding, reversal pending, count unknown).
    ///
    /// # Errors
    /// Returns the page fetch error; the page set is left unchanged.
    pub async fn fetch_next(&self, direction: Direction) -> Result<Option<PageNumber>> {
        let page = {
            let mut state = self.shared.lock();
            let reversing = state.reversal.is_pending();
            let Some(page) = state.window.next_page(direction, reversing) else {
                return Ok(None);
            };
            self.shared
                .commit(&mut state, [WindowMutation::SetPending(Some(page))]);
            page
        };

        tracing::debug!(
            resource_id = %self.shared.resource_id,
            page,
            ?direction,
            "fetching next page"
        );
        let fetched = self.shared.cache.fetch_if_absent(&self.shared.key(page)).await;

        let mut state = self.shared.lock();
        let mut batch = vec![WindowMutation::SetPending(None)];
        let adjacent = {
            let pages = state.window.pages();
            pages.first().is_some_and(|first| first - 1 == page)
                || pages.last().is_some_and(|last| last + 1 == page)
        };
        let added = fetched.is_ok() && adjacent && !state.reversal.is_pending();
        if added {
            batch.push(WindowMutation::SetPages(state.window.pages().with_page(page)));
        }
        self.shared.commit(&mut state, batch);
        fetched?;
        Ok(added.then_some(page))
    }

    /// Places a new comment (or re-checks the latest page when `None`) and
    /// jumps the window to it.
    ///
    /// Returns the page the comment belongs to, or `None` if nothing is
    /// loaded yet or a reversal is already pending.
    ///
    /// # Errors
    /// Returns the first fetch error of the placement. No reversal starts in
    /// that case and the call can be retried.
    pub async fn reverse(&self, comment: Option<Comment>) -> Result<Option<PageNumber>> {
        let prior_count = {
            let mut state = self.shared.lock();
            if state.reversal.is_pending() {
                invariant_violation("reversal requested while another is pending");
                return Ok(None);
            }
            // pages rolled back out of the window may still carry a newer count
            if state.window.count().is_some()
                && let Some(cached) = self.shared.cache.max_count(&self.shared.resource_id)
            {
                state.window.observe_count(cached);
            }
            state.window.count()
        };
        let Some(prior_count) = prior_count else {
            tracing::debug!(
                resource_id = %self.shared.resource_id,
                "reverse skipped: count unknown"
            );
            return Ok(None);
        };

        let page_size = self.shared.cache.page_size();
        let target = Placement::resolve(prior_count, comment.is_some(), page_size);
        placement::place(&self.shared.cache, &self.shared.resource_id, target, comment).await?;

        let mut state = self.shared.lock();
        if state.window.pages().contains(target.page) {
            self.shared.resync(&mut state);
            return Ok(Some(target.page));
        }

        let current = state.window.pages().clone();
        let Some(plan) = state.reversal.begin(&current, target.page, page_size) else {
            invariant_violation("reversal started while another is pending");
            return Ok(Some(target.page));
        };
        tracing::debug!(
            resource_id = %self.shared.resource_id,
            page = target.page,
            merged = ?plan.merged_pages,
            "reversal pending"
        );
        self.shared
            .commit(&mut state, [WindowMutation::SetPages(plan.merged_pages)]);
        drop(state);

        self.schedule_rollback(plan.id);
        Ok(Some(target.page))
    }

    fn schedule_rollback(&self, id: ReversalId) {
        let shared: Weak<Shared<S>> = Arc::downgrade(&self.shared);
        let delay = self.rollback_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut state = shared.lock();
            if let Some(fallback) = state.reversal.on_timeout(id) {
                tracing::debug!(
                    resource_id = %shared.resource_id,
                    pages = ?fallback,
                    "reversal rolled back"
                );
                shared.commit(&mut state, [WindowMutation::SetPages(fallback)]);
            }
        });
    }

    /// Scroll settled with items `start..=end` visible. Commits a pending
    /// reversal once the viewport is past its gap; returns whether it did.
    pub fn check_is_reversed(&self, start: usize, end: usize) -> bool {
        let mut state = self.shared.lock();
        let Some(target) = state.reversal.on_scroll(start, end) else {
            return false;
        };
        tracing::debug!(
            resource_id = %self.shared.resource_id,
            pages = ?target,
            "reversal committed"
        );
        self.shared.commit(
            &mut state,
            [
                WindowMutation::SetPages(target),
                WindowMutation::MarkReversed,
            ],
        );
        true
    }

    /// Creates a comment and moves the window to it.
    ///
    /// A failed placement is logged, not returned: the comment exists on the
    /// server and stays reachable by paging forward.
    ///
    /// # Errors
    /// Returns an error only if the comment could not be created.
    pub async fn post_comment(&self, draft: CommentDraft) -> Result<Comment> {
        let comment = self
            .shared
            .cache
            .source()
            .create_comment(&self.shared.resource_id, draft)
            .await?;
        if let Err(err) = self.reverse(Some(comment.clone())).await {
            tracing::warn!(
                resource_id = %self.shared.resource_id,
                comment_id = %comment.id,
                error = %err,
                "comment created but window did not move"
            );
        }
        Ok(comment)
    }
}
