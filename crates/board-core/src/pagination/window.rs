//! Comment window state.
//!
//! The window owns the loaded page numbers of one thread and the page
//! results it last read from the cache. It performs no I/O: the thread
//! facade decides what to fetch, then applies the outcome as a batch of
//! [`WindowMutation`]s.

use std::collections::BTreeMap;

use board_types::{CommentItem, Direction, LATEST_PAGE, LoaderSlot, PageNumber, PageResult};

use super::page_set::{PageSet, pages_for_count};

/// A state change applied by the thread facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowMutation {
    /// Replace the loaded page set.
    SetPages(PageSet),
    /// Mark (or clear) the page whose fetch is outstanding.
    SetPending(Option<PageNumber>),
    /// The window is now anchored at the latest page.
    MarkReversed,
}

#[derive(Debug, Clone)]
pub struct CommentWindow {
    page_size: u32,
    pages: PageSet,
    /// Results for pages in `pages` that are present in the cache.
    results: BTreeMap<PageNumber, PageResult>,
    pending: Option<PageNumber>,
    reversed: bool,
    /// Largest count seen so far; survives pages leaving the set.
    max_count: Option<u64>,
}

impl CommentWindow {
    /// Chooses the initial pages for a thread.
    ///
    /// Resumes from pages already in the cache when possible: the contiguous
    /// run starting at page 1, or for a reversed thread the contiguous run
    /// ending at the largest cached page. Otherwise requests page 1, or the
    /// latest-page sentinel when reversed.
    pub fn initial(page_size: u32, reversed: bool, resident: &[PageNumber]) -> Self {
        let resident = PageSet::from_pages(resident.iter().copied().filter(|&p| p >= 1).collect());
        let resumed = if reversed {
            resident.contiguous_suffix()
        } else {
            resident.contiguous_prefix()
        };
        let pages = if !resumed.is_empty() {
            resumed
        } else if reversed {
            PageSet::single(LATEST_PAGE)
        } else {
            PageSet::single(1)
        };

        Self {
            page_size: page_size.max(1),
            pages,
            results: BTreeMap::new(),
            pending: None,
            reversed,
            max_count: None,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn pages(&self) -> &PageSet {
        &self.pages
    }

    pub fn pending(&self) -> Option<PageNumber> {
        self.pending
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// True once every page in the set has a result.
    pub fn is_settled(&self) -> bool {
        self.results.len() == self.pages.len()
    }

    /// Largest thread count reported by any page this window has loaded,
    /// including pages since dropped from the set.
    pub fn count(&self) -> Option<u64> {
        self.max_count
    }

    /// Raises the known count to `count` if it is larger.
    pub fn observe_count(&mut self, count: u64) {
        self.max_count = self.max_count.max(Some(count));
    }

    /// Total number of pages implied by [`Self::count`].
    pub fn page_count(&self) -> Option<PageNumber> {
        self.count()
            .map(|count| pages_for_count(count, self.page_size))
    }

    pub fn has_prev_page(&self) -> bool {
        self.pages.first().is_some_and(|first| first != 1)
    }

    pub fn has_next_page(&self) -> bool {
        if self.pages.is_latest_sentinel() {
            return false;
        }
        match (self.pages.last(), self.page_count()) {
            (Some(last), Some(total)) => last < total,
            _ => false,
        }
    }

    /// Comments of the loaded pages in page order, framed by loader
    /// placeholders where more pages exist.
    pub fn comments(&self) -> Vec<CommentItem> {
        let mut items: Vec<CommentItem> = self
            .pages
            .iter()
            .filter_map(|page| self.results.get(&page))
            .flat_map(|result| result.items.iter().cloned().map(CommentItem::Comment))
            .collect();
        if self.has_prev_page() && !self.pages.is_latest_sentinel() {
            items.insert(0, CommentItem::Loader(LoaderSlot::Prev));
        }
        if self.has_next_page() {
            items.push(CommentItem::Loader(LoaderSlot::Next));
        }
        items
    }

    /// Page to fetch for `fetch_next(direction)`, or `None` when the window
    /// must not extend right now.
    pub fn next_page(&self, direction: Direction, reversing: bool) -> Option<PageNumber> {
        if reversing || self.pending.is_some() || !self.is_settled() {
            return None;
        }
        if self.pages.is_latest_sentinel() {
            return None;
        }
        let total = self.page_count().filter(|_| self.count() != Some(0))?;
        match direction {
            Direction::Start => {
                let first = self.pages.first()?;
                (first > 1).then_some(first - 1)
            }
            Direction::End => {
                let last = self.pages.last()?;
                (last < total).then_some(last + 1)
            }
        }
    }

    /// Real page number the sentinel resolves to, once its result is loaded.
    pub fn sentinel_target(&self) -> Option<PageNumber> {
        if !self.pages.is_latest_sentinel() {
            return None;
        }
        self.results
            .get(&LATEST_PAGE)
            .map(|result| pages_for_count(result.count, self.page_size))
    }

    /// Re-reads page results for the current set through `lookup`.
    pub fn sync_results<F>(&mut self, lookup: F)
    where
        F: Fn(PageNumber) -> Option<PageResult>,
    {
        self.results = self
            .pages
            .iter()
            .filter_map(|page| lookup(page).map(|result| (page, result)))
            .collect();
        let loaded = self.results.values().map(|result| result.count).max();
        self.max_count = self.max_count.max(loaded);
    }

    pub fn apply(&mut self, mutation: WindowMutation) {
        match mutation {
            WindowMutation::SetPages(pages) => {
                debug_assert!(pages.is_well_formed(), "page set out of order: {pages:?}");
                self.results.retain(|page, _| pages.contains(*page));
                self.pages = pages;
            }
            WindowMutation::SetPending(page) => self.pending = page,
            WindowMutation::MarkReversed => self.reversed = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use board_types::{Comment, CommentKind};
    use chrono::Utc;

    use super::*;

    fn comment(n: u64) -> Comment {
        Comment {
            id: format!("c{n}"),
            content: format!("comment {n}"),
            kind: CommentKind::Public,
            created_at: Utc::now(),
            author: None,
        }
    }

    fn page(count: u64, page: PageNumber) -> PageResult {
        let start = (page as u64 - 1) * 20 + 1;
        let end = (page as u64 * 20).min(count);
        PageResult::new(count, (start..=end).map(comment).collect())
    }

    fn loaded(pages: &[PageNumber], count: u64) -> CommentWindow {
        let mut window = CommentWindow::initial(20, false, &[]);
        window.apply(WindowMutation::SetPages(PageSet::from_pages(pages.to_vec())));
        window.sync_results(|p| Some(page(count, p)));
        window
    }

    #[test]
    fn test_initial_without_cache() {
        assert_eq!(CommentWindow::initial(20, false, &[]).pages().to_vec(), vec![1]);
        assert_eq!(
            CommentWindow::initial(20, true, &[]).pages().to_vec(),
            vec![LATEST_PAGE]
        );
    }

    #[test]
    fn test_initial_resumes_from_cache() {
        let resident = [1, 2, 3, 5, 6];
        assert_eq!(
            CommentWindow::initial(20, false, &resident).pages().to_vec(),
            vec![1, 2, 3]
        );
        assert_eq!(
            CommentWindow::initial(20, true, &resident).pages().to_vec(),
            vec![5, 6]
        );
        // no page 1 cached: nothing to resume from the start
        assert_eq!(
            CommentWindow::initial(20, false, &[4, 5]).pages().to_vec(),
            vec![1]
        );
    }

    #[test]
    fn test_count_and_boundaries() {
        let window = loaded(&[1], 25);

        assert_eq!(window.count(), Some(25));
        assert_eq!(window.page_count(), Some(2));
        assert!(!window.has_prev_page());
        assert!(window.has_next_page());
        assert_eq!(window.next_page(Direction::End, false), Some(2));
        assert_eq!(window.next_page(Direction::Start, false), None);
    }

    #[test]
    fn test_count_survives_shrinking_page_set() {
        let mut window = loaded(&[1, 5, 6], 120);
        window.apply(WindowMutation::SetPages(PageSet::single(1)));
        window.sync_results(|p| Some(page(119, p)));

        assert_eq!(window.count(), Some(120));
        assert_eq!(window.page_count(), Some(6));

        window.observe_count(118);
        assert_eq!(window.count(), Some(120));
        window.observe_count(121);
        assert_eq!(window.count(), Some(121));
    }

    #[test]
    fn test_next_page_at_last_page_is_none() {
        let window = loaded(&[1, 2], 25);

        assert!(!window.has_next_page());
        assert_eq!(window.next_page(Direction::End, false), None);
    }

    #[test]
    fn test_next_page_guards() {
        let window = loaded(&[2], 45);
        assert_eq!(window.next_page(Direction::Start, false), Some(1));
        assert_eq!(window.next_page(Direction::Start, true), None);

        let mut pending = window.clone();
        pending.apply(WindowMutation::SetPending(Some(3)));
        assert_eq!(pending.next_page(Direction::End, false), None);

        let mut unsettled = window;
        unsettled.apply(WindowMutation::SetPages(PageSet::from_pages(vec![2, 3])));
        assert!(!unsettled.is_settled());
        assert_eq!(unsettled.next_page(Direction::End, false), None);

        let empty = loaded(&[1], 0);
        assert_eq!(empty.next_page(Direction::End, false), None);
    }

    #[test]
    fn test_comments_concatenate_with_loaders() {
        let window = loaded(&[2, 3], 70);
        let items = window.comments();

        assert_eq!(items.first(), Some(&CommentItem::Loader(LoaderSlot::Prev)));
        assert_eq!(items.last(), Some(&CommentItem::Loader(LoaderSlot::Next)));
        assert_eq!(items.len(), 42);
        assert_eq!(items[1].id(), "c21");
        assert_eq!(items[40].id(), "c60");
    }

    #[test]
    fn test_sentinel_window() {
        let mut window = CommentWindow::initial(20, true, &[]);
        assert_eq!(window.sentinel_target(), None);

        window.sync_results(|_| Some(PageResult::new(47, Vec::new())));

        assert_eq!(window.sentinel_target(), Some(3));
        assert!(window.has_prev_page());
        assert!(!window.has_next_page());
        assert_eq!(window.next_page(Direction::Start, false), None);
        assert!(!window.comments().iter().any(CommentItem::is_loader));
    }
}
