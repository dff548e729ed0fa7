//! Backends that serve comment pages and accept new comments.

use std::future::Future;

use anyhow::Result;
use board_types::{Comment, CommentDraft, PageRequest, PageResult};

pub mod http;
pub mod memory;

pub use http::HttpCommentSource;
pub use memory::InMemoryCommentSource;

/// Network side of a comment thread.
///
/// `fetch_page` with page [`board_types::LATEST_PAGE`] asks the backend
/// for its latest page; the returned `count` is authoritative.
pub trait CommentSource: Send + Sync + 'static {
    fn fetch_page(&self, request: PageRequest) -> impl Future<Output = Result<PageResult>> + Send;

    fn create_comment(
        &self,
        resource_id: &str,
        draft: CommentDraft,
    ) -> impl Future<Output = Result<Comment>> + Send;
}
