//! Paginated comment windows.
//!
//! - [`page_set`]: ordered page numbers and gap queries
//! - [`window`]: loaded pages, derived comments, extension rules
//! - [`placement`]: page placement of a new comment
//! - [`reversal`]: jump-to-latest with scroll commit and timed rollback
//! - [`thread`]: the facade a view talks to

pub mod page_set;
pub mod placement;
pub mod reversal;
pub mod thread;
pub mod window;

pub use page_set::{
    PageSet, find_gap_ascending, find_last_gap_descending, insert_range, pages_for_count,
};
pub use placement::Placement;
pub use reversal::{ROLLBACK_DELAY_MS, ReversalController, ReversalId, ReversalState};
pub use thread::{CommentThread, ThreadOptions, ThreadSnapshot};
pub use window::{CommentWindow, WindowMutation};
