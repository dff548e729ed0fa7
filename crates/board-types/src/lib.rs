//! Shared data types for board comment threads.
//!
//! These are plain values passed between the page cache, the comment
//! sources and the pagination controller. Serde casing follows the
//! backend wire format (`pageSize`, `createdAt`, `type`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1-indexed page number. Negative values are reserved for [`LATEST_PAGE`].
pub type PageNumber = i64;

/// Sentinel page: "the most recent page, exact number pending".
pub const LATEST_PAGE: PageNumber = -1;

/// Default number of comments per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One fetched page of a thread.
///
/// `count` is the total number of comments in the whole thread as seen by
/// the fetch that produced this page, not the length of `items`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageResult {
    pub count: u64,
    #[serde(default)]
    pub items: Vec<Comment>,
}

impl PageResult {
    pub fn new(count: u64, items: Vec<Comment>) -> Self {
        Self { count, items }
    }
}

/// Visibility of a comment's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    #[default]
    Public,
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A stored comment on a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: CommentKind,
    pub created_at: DateTime<Utc>,
    /// Absent for anonymous comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
}

/// A comment about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: CommentKind,
}

impl CommentDraft {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: CommentKind::Public,
        }
    }

    pub fn anonymous(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: CommentKind::Anonymous,
        }
    }
}

/// Which edge of the loaded window a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderSlot {
    Prev,
    Next,
}

impl LoaderSlot {
    pub fn id(self) -> &'static str {
        match self {
            LoaderSlot::Prev => "prev-item",
            LoaderSlot::Next => "next-item",
        }
    }
}

/// Entry of the flattened list shown to the UI.
///
/// Loader placeholders exist only for the "load more" affordance and are
/// never counted in page math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentItem {
    Comment(Comment),
    Loader(LoaderSlot),
}

impl CommentItem {
    pub fn id(&self) -> &str {
        match self {
            CommentItem::Comment(comment) => &comment.id,
            CommentItem::Loader(slot) => slot.id(),
        }
    }

    pub fn is_loader(&self) -> bool {
        matches!(self, CommentItem::Loader(_))
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            CommentItem::Comment(comment) => Some(comment),
            CommentItem::Loader(_) => None,
        }
    }
}

/// Pagination direction relative to the loaded window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards page 1 (older comments).
    Start,
    /// Towards the latest page.
    End,
}

/// Query sent to a comment source for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub resource_id: String,
    pub page: PageNumber,
    pub page_size: u32,
}
