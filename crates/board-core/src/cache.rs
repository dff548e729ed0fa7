//! Shared page cache.
//!
//! Keyed by `(resource id, page number)`. One cache is shared by every open
//! thread view (wrap it in an `Arc`); entries are last-writer-wins per key
//! and there are no multi-key transactions.
//!
//! ## Cancellation
//!
//! Every in-flight fetch owns a `CancellationToken`. `cancel(key)` fires
//! the token; the fetch then resolves to [`FetchCancelled`] and never writes
//! its (possibly stale) result into the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use board_types::{PageNumber, PageRequest, PageResult};
use tokio_util::sync::CancellationToken;

use crate::sources::CommentSource;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub resource_id: String,
    pub page: PageNumber,
}

impl PageKey {
    pub fn new(resource_id: impl Into<String>, page: PageNumber) -> Self {
        Self {
            resource_id: resource_id.into(),
            page,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource_id, self.page)
    }
}

/// A fetch was cancelled before its result could be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCancelled {
    pub key: PageKey,
}

impl fmt::Display for FetchCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fetch of page {} was cancelled", self.key)
    }
}

impl std::error::Error for FetchCancelled {}

#[derive(Debug)]
struct InFlight {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PageKey, PageResult>,
    in_flight: HashMap<PageKey, InFlight>,
    next_fetch: u64,
}

pub struct PageCache<S> {
    source: S,
    page_size: u32,
    state: Mutex<CacheState>,
}

impl<S: CommentSource> PageCache<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self, key: &PageKey) -> Option<PageResult> {
        self.lock().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Replaces the entry at `key` with `updater(previous)`.
    pub fn write<F>(&self, key: PageKey, updater: F)
    where
        F: FnOnce(Option<&PageResult>) -> PageResult,
    {
        let mut state = self.lock();
        let next = updater(state.entries.get(&key));
        state.entries.insert(key, next);
    }

    /// Returns the cached page, fetching and storing it on a miss.
    ///
    /// # Errors
    /// Returns the source error, or [`FetchCancelled`] if `cancel(key)` ran
    /// while the request was in flight.
    pub async fn fetch_if_absent(&self, key: &PageKey) -> Result<PageResult> {
        let (id, token) = {
            let mut state = self.lock();
            if let Some(hit) = state.entries.get(key) {
                return Ok(hit.clone());
            }
            let id = state.next_fetch;
            state.next_fetch = state.next_fetch.wrapping_add(1);
            let token = CancellationToken::new();
            state.in_flight.insert(
                key.clone(),
                InFlight {
                    id,
                    cancel: token.clone(),
                },
            );
            (id, token)
        };

        tracing::debug!(%key, "fetching comment page");
        let request = PageRequest {
            resource_id: key.resource_id.clone(),
            page: key.page,
            page_size: self.page_size,
        };
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = self.source.fetch_page(request) => Some(result),
        };

        let mut state = self.lock();
        if state.in_flight.get(key).is_some_and(|flight| flight.id == id) {
            state.in_flight.remove(key);
        }
        match outcome {
            Some(Ok(page)) if !token.is_cancelled() => {
                state.entries.insert(key.clone(), page.clone());
                Ok(page)
            }
            Some(Err(err)) => {
                tracing::warn!(%key, error = %err, "comment page fetch failed");
                Err(err)
            }
            _ => {
                tracing::debug!(%key, "discarding cancelled page fetch");
                Err(FetchCancelled { key: key.clone() }.into())
            }
        }
    }

    /// Cancels the in-flight fetch for `key`, if any. Cached data is kept.
    pub fn cancel(&self, key: &PageKey) {
        if let Some(flight) = self.lock().in_flight.remove(key) {
            flight.cancel.cancel();
        }
    }

    pub fn is_fetching(&self, key: &PageKey) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    /// Drops one entry and cancels its in-flight fetch.
    pub fn invalidate(&self, key: &PageKey) {
        let mut state = self.lock();
        state.entries.remove(key);
        if let Some(flight) = state.in_flight.remove(key) {
            flight.cancel.cancel();
        }
    }

    /// Drops every entry of one thread and cancels its in-flight fetches.
    pub fn invalidate_resource(&self, resource_id: &str) {
        let mut state = self.lock();
        state.entries.retain(|key, _| key.resource_id != resource_id);
        state.in_flight.retain(|key, flight| {
            let keep = key.resource_id != resource_id;
            if !keep {
                flight.cancel.cancel();
            }
            keep
        });
    }

    /// Ascending real page numbers cached for a thread (sentinel excluded).
    pub fn resident_pages(&self, resource_id: &str) -> Vec<PageNumber> {
        let mut pages: Vec<PageNumber> = self
            .lock()
            .entries
            .keys()
            .filter(|key| key.resource_id == resource_id && key.page >= 1)
            .map(|key| key.page)
            .collect();
        pages.sort_unstable();
        pages
    }

    /// Largest count held by any cached page of a thread, sentinel included.
    pub fn max_count(&self, resource_id: &str) -> Option<u64> {
        self.lock()
            .entries
            .iter()
            .filter(|(key, _)| key.resource_id == resource_id)
            .map(|(_, page)| page.count)
            .max()
    }
}

impl<S> fmt::Debug for PageCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCache")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
