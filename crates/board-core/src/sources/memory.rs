//! In-process comment backend.
//!
//! Serves count-based pages out of a `Vec` per thread. Used for offline
//! runs and for exercising the pagination controller without a server.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use board_types::{Comment, CommentDraft, LATEST_PAGE, PageNumber, PageRequest, PageResult};
use chrono::Utc;
use uuid::Uuid;

use super::CommentSource;
use crate::pagination::pages_for_count;

#[derive(Debug, Default)]
struct MemoryState {
    threads: HashMap<String, Vec<Comment>>,
    fetches: HashMap<(String, PageNumber), usize>,
    failing: HashSet<(String, PageNumber)>,
}

#[derive(Debug, Default)]
pub struct InMemoryCommentSource {
    state: Mutex<MemoryState>,
}

impl InMemoryCommentSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends stored comments to a thread without going through `create_comment`.
    pub fn seed(&self, resource_id: &str, comments: impl IntoIterator<Item = Comment>) {
        self.lock()
            .threads
            .entry(resource_id.to_string())
            .or_default()
            .extend(comments);
    }

    /// Seeds `count` public comments with ids `{resource_id}-{n}` (1-based).
    pub fn seed_numbered(&self, resource_id: &str, count: usize) {
        let start = self.comment_count(resource_id);
        let comments = (start + 1..=start + count).map(|n| Comment {
            id: format!("{resource_id}-{n}"),
            content: format!("comment {n}"),
            kind: board_types::CommentKind::Public,
            created_at: Utc::now(),
            author: None,
        });
        self.seed(resource_id, comments);
    }

    pub fn comment_count(&self, resource_id: &str) -> usize {
        self.lock().threads.get(resource_id).map_or(0, Vec::len)
    }

    /// Makes every future fetch of `page` for `resource_id` fail.
    pub fn fail_page(&self, resource_id: &str, page: PageNumber) {
        self.lock().failing.insert((resource_id.to_string(), page));
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Number of fetches performed for one key so far.
    pub fn fetch_calls(&self, resource_id: &str, page: PageNumber) -> usize {
        self.lock()
            .fetches
            .get(&(resource_id.to_string(), page))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetch_calls(&self) -> usize {
        self.lock().fetches.values().sum()
    }
}

impl CommentSource for InMemoryCommentSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<PageResult> {
        let mut state = self.lock();
        *state
            .fetches
            .entry((request.resource_id.clone(), request.page))
            .or_default() += 1;

        if state
            .failing
            .contains(&(request.resource_id.clone(), request.page))
        {
            bail!(
                "Page {} of {} is unavailable",
                request.page,
                request.resource_id
            );
        }
        if request.page < 1 && request.page != LATEST_PAGE {
            bail!("Invalid page number {}", request.page);
        }

        let comments = state
            .threads
            .get(&request.resource_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let count = comments.len() as u64;
        let page = if request.page == LATEST_PAGE {
            pages_for_count(count, request.page_size)
        } else {
            request.page
        };

        let size = request.page_size.max(1) as usize;
        let start = (page as usize - 1).saturating_mul(size).min(comments.len());
        let end = start.saturating_add(size).min(comments.len());
        Ok(PageResult::new(count, comments[start..end].to_vec()))
    }

    async fn create_comment(&self, resource_id: &str, draft: CommentDraft) -> Result<Comment> {
        if draft.content.trim().is_empty() {
            bail!("Comment content cannot be empty");
        }
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            content: draft.content,
            kind: draft.kind,
            created_at: Utc::now(),
            author: None,
        };
        self.lock()
            .threads
            .entry(resource_id.to_string())
            .or_default()
            .push(comment.clone());
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(page: PageNumber) -> PageRequest {
        PageRequest {
            resource_id: "note".to_string(),
            page,
            page_size: 20,
        }
    }

    #[tokio::test]
    async fn test_serves_count_based_pages() {
        let source = InMemoryCommentSource::new();
        source.seed_numbered("note", 47);

        let second = source.fetch_page(request(2)).await.unwrap();
        let latest = source.fetch_page(request(LATEST_PAGE)).await.unwrap();

        assert_eq!(second.count, 47);
        assert_eq!(second.items.len(), 20);
        assert_eq!(second.items[0].id, "note-21");
        assert_eq!(latest.items.len(), 7);
        assert_eq!(latest.items[0].id, "note-41");
        assert_eq!(source.fetch_calls("note", 2), 1);
        assert_eq!(source.fetch_calls("note", 3), 0);
        assert_eq!(source.total_fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_thread_has_one_empty_page() {
        let source = InMemoryCommentSource::new();

        let page = source.fetch_page(request(LATEST_PAGE)).await.unwrap();

        assert_eq!(page, PageResult::new(0, Vec::new()));
    }

    #[tokio::test]
    async fn test_failing_page() {
        let source = InMemoryCommentSource::new();
        source.fail_page("note", 1);

        let err = source.fetch_page(request(1)).await.unwrap_err();

        assert!(err.to_string().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_create_comment_appends() {
        let source = InMemoryCommentSource::new();

        let created = source
            .create_comment("note", CommentDraft::anonymous("hi"))
            .await
            .unwrap();

        assert_eq!(source.comment_count("note"), 1);
        assert_eq!(created.kind, board_types::CommentKind::Anonymous);
        assert!(
            source
                .create_comment("note", CommentDraft::public("  "))
                .await
                .is_err()
        );
    }
}
