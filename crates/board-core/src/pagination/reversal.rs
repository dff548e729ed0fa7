//! Jump-to-latest coordination.
//!
//! When a new comment lands on a page outside the loaded window, the window
//! temporarily holds both the old pages and the pages around the new
//! comment. The reversal then either commits (the viewport scrolled past the
//! gap between the two runs) or rolls back to the old pages after a delay.

use board_types::PageNumber;

use super::page_set::PageSet;

/// Default delay before an unconfirmed reversal is abandoned.
pub const ROLLBACK_DELAY_MS: u64 = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReversalId(pub u64);

/// In-flight reversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalState {
    pub id: ReversalId,
    /// Pages adopted on commit.
    pub target_pages: PageSet,
    /// Item index of the first gap in the merged set; `None` when the merged
    /// set is contiguous, in which case scrolling never commits.
    pub gap_start_index: Option<usize>,
    /// Pages restored on rollback.
    pub fallback_pages: PageSet,
}

/// Result of starting a reversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalPlan {
    pub id: ReversalId,
    /// Window pages while the reversal is pending.
    pub merged_pages: PageSet,
}

#[derive(Debug, Default)]
pub struct ReversalController {
    pending: Option<ReversalState>,
    next_id: u64,
}

impl ReversalController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&ReversalState> {
        self.pending.as_ref()
    }

    /// Enters the pending state for a comment placed on `new_page`.
    ///
    /// Returns `None` if a reversal is already pending; only one
    /// creation-driven reversal may be outstanding.
    pub fn begin(
        &mut self,
        current: &PageSet,
        new_page: PageNumber,
        page_size: u32,
    ) -> Option<ReversalPlan> {
        if self.pending.is_some() {
            return None;
        }

        let run: Vec<PageNumber> = if new_page > 1 {
            vec![new_page - 1, new_page]
        } else {
            vec![new_page]
        };
        let merged = current.with_range(&run);
        let gap = merged.first_gap();
        let target_pages = match gap {
            Some(gap) => merged.suffix_after(gap),
            None => merged.clone(),
        };

        let id = ReversalId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.pending = Some(ReversalState {
            id,
            target_pages,
            gap_start_index: gap.map(|gap| gap * page_size as usize),
            fallback_pages: current.clone(),
        });

        Some(ReversalPlan {
            id,
            merged_pages: merged,
        })
    }

    /// Scroll settled on items `start..=end`. Returns the pages to adopt if
    /// the viewport has crossed the gap.
    pub fn on_scroll(&mut self, start: usize, end: usize) -> Option<PageSet> {
        let gap_start = self.pending.as_ref()?.gap_start_index?;
        if start > gap_start || end > gap_start {
            return self.pending.take().map(|state| state.target_pages);
        }
        None
    }

    /// Rollback timer for `id` fired. Returns the pages to restore if that
    /// reversal is still pending.
    pub fn on_timeout(&mut self, id: ReversalId) -> Option<PageSet> {
        if self.pending.as_ref().is_some_and(|state| state.id == id) {
            return self.pending.take().map(|state| state.fallback_pages);
        }
        None
    }
}
