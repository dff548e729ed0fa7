//! Ordered set of loaded page numbers with gap queries.

use board_types::{LATEST_PAGE, PageNumber};

/// Number of pages needed to hold `count` comments. Never less than 1:
/// an empty thread still has one (empty) page.
pub fn pages_for_count(count: u64, page_size: u32) -> PageNumber {
    let page_size = u64::from(page_size.max(1));
    count.div_ceil(page_size).max(1) as PageNumber
}

/// Index `i` of the first `i` where `pages[i + 1] - pages[i] > 1`.
pub fn find_gap_ascending(pages: &[PageNumber]) -> Option<usize> {
    pages.windows(2).position(|pair| pair[1] - pair[0] > 1)
}

/// Index `i` of the last `i` where `pages[i + 1] - pages[i] > 1`.
pub fn find_last_gap_descending(pages: &[PageNumber]) -> Option<usize> {
    pages.windows(2).rposition(|pair| pair[1] - pair[0] > 1)
}

/// Merges an ascending run of page numbers into `pages`.
///
/// Existing numbers inside `[new[0], new[last]]` are replaced by `new`;
/// everything outside that range is kept.
pub fn insert_range(pages: &[PageNumber], new: &[PageNumber]) -> Vec<PageNumber> {
    let (Some(&low), Some(&high)) = (new.first(), new.last()) else {
        return pages.to_vec();
    };
    debug_assert!(
        new.windows(2).all(|pair| pair[0] < pair[1]),
        "inserted pages must be strictly ascending: {new:?}"
    );

    let mut merged = Vec::with_capacity(pages.len() + new.len());
    merged.extend(pages.iter().copied().filter(|&page| page < low));
    merged.extend_from_slice(new);
    merged.extend(pages.iter().copied().filter(|&page| page > high));
    merged
}

/// Strictly ascending, duplicate-free list of page numbers for one thread.
///
/// The sentinel [`LATEST_PAGE`] may appear only alone, at index 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSet(Vec<PageNumber>);

impl PageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(page: PageNumber) -> Self {
        Self(vec![page])
    }

    /// Builds a set from an arbitrary list, sorting and dropping duplicates.
    pub fn from_pages(mut pages: Vec<PageNumber>) -> Self {
        pages.sort_unstable();
        pages.dedup();
        Self(pages)
    }

    pub fn as_slice(&self) -> &[PageNumber] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<PageNumber> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<PageNumber> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<PageNumber> {
        self.0.last().copied()
    }

    pub fn contains(&self, page: PageNumber) -> bool {
        self.0.binary_search(&page).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = PageNumber> + '_ {
        self.0.iter().copied()
    }

    /// True when the window sits on the unresolved latest-page sentinel.
    pub fn is_latest_sentinel(&self) -> bool {
        self.0.first() == Some(&LATEST_PAGE)
    }

    pub fn first_gap(&self) -> Option<usize> {
        find_gap_ascending(&self.0)
    }

    pub fn last_gap(&self) -> Option<usize> {
        find_last_gap_descending(&self.0)
    }

    pub fn is_contiguous(&self) -> bool {
        self.first_gap().is_none()
    }

    pub fn with_range(&self, new: &[PageNumber]) -> Self {
        Self(insert_range(&self.0, new))
    }

    pub fn with_page(&self, page: PageNumber) -> Self {
        self.with_range(&[page])
    }

    /// Pages after the gap at `gap` (the contiguous run starting at `gap + 1`).
    pub fn suffix_after(&self, gap: usize) -> Self {
        Self(self.0.get(gap + 1..).map(<[_]>::to_vec).unwrap_or_default())
    }

    /// Longest contiguous run starting at page 1, or empty if page 1 is absent.
    pub fn contiguous_prefix(&self) -> Self {
        if self.first() != Some(1) {
            return Self::new();
        }
        match self.first_gap() {
            Some(gap) => Self(self.0[..=gap].to_vec()),
            None => self.clone(),
        }
    }

    /// Longest contiguous run ending at the largest page.
    pub fn contiguous_suffix(&self) -> Self {
        match self.last_gap() {
            Some(gap) => self.suffix_after(gap),
            None => self.clone(),
        }
    }

    /// Checks the ordering invariant.
    pub fn is_well_formed(&self) -> bool {
        let ascending = self.0.windows(2).all(|pair| pair[0] < pair[1]);
        let sentinel_ok = !self.0.iter().skip(1).any(|&page| page == LATEST_PAGE);
        ascending && sentinel_ok
    }
}

impl From<Vec<PageNumber>> for PageSet {
    fn from(pages: Vec<PageNumber>) -> Self {
        Self::from_pages(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_strictly_ascending(pages: &[PageNumber]) -> bool {
        pages.windows(2).all(|pair| pair[0] < pair[1])
    }

    #[test]
    fn test_pages_for_count() {
        assert_eq!(pages_for_count(0, 20), 1);
        assert_eq!(pages_for_count(1, 20), 1);
        assert_eq!(pages_for_count(20, 20), 1);
        assert_eq!(pages_for_count(21, 20), 2);
        assert_eq!(pages_for_count(47, 20), 3);
    }

    #[test]
    fn test_find_gap_ascending() {
        assert_eq!(find_gap_ascending(&[]), None);
        assert_eq!(find_gap_ascending(&[4]), None);
        assert_eq!(find_gap_ascending(&[1, 2, 3]), None);
        assert_eq!(find_gap_ascending(&[1, 2, 5, 6, 9]), Some(1));
    }

    #[test]
    fn test_find_last_gap_descending() {
        assert_eq!(find_last_gap_descending(&[1, 2, 3]), None);
        assert_eq!(find_last_gap_descending(&[1, 2, 5, 6, 9]), Some(3));
        assert_eq!(find_last_gap_descending(&[1, 3]), Some(0));
    }

    #[test]
    fn test_gap_absent_iff_contiguous() {
        let cases: [&[PageNumber]; 6] = [
            &[],
            &[7],
            &[1, 2, 3, 4],
            &[1, 3],
            &[2, 3, 4, 8],
            &[-1],
        ];
        for pages in cases {
            let contiguous = pages.windows(2).all(|pair| pair[1] - pair[0] == 1);
            assert_eq!(find_gap_ascending(pages).is_none(), contiguous, "{pages:?}");
        }
    }

    #[test]
    fn test_insert_range_examples() {
        assert_eq!(insert_range(&[1, 2, 4], &[5, 6]), vec![1, 2, 4, 5, 6]);
        assert_eq!(insert_range(&[1, 2, 6, 7], &[3, 4]), vec![1, 2, 3, 4, 6, 7]);
        assert_eq!(insert_range(&[1, 2, 3, 4, 7], &[4, 5]), vec![1, 2, 3, 4, 5, 7]);
    }

    #[test]
    fn test_insert_range_positions() {
        // entirely before
        assert_eq!(insert_range(&[5, 6], &[1, 2]), vec![1, 2, 5, 6]);
        // overlapping front
        assert_eq!(insert_range(&[3, 4, 5], &[2, 3]), vec![2, 3, 4, 5]);
        // overlapping back
        assert_eq!(insert_range(&[3, 4, 5], &[5, 6]), vec![3, 4, 5, 6]);
        // fully internal, replacing what lies in range
        assert_eq!(insert_range(&[1, 2, 3, 9], &[2, 4]), vec![1, 2, 4, 9]);
        // empty inputs
        assert_eq!(insert_range(&[], &[3, 4]), vec![3, 4]);
        assert_eq!(insert_range(&[1, 2], &[]), vec![1, 2]);
    }

    #[test]
    fn test_insert_range_keeps_outside_and_new() {
        let sets: [&[PageNumber]; 4] = [&[1, 2, 3], &[2, 5, 8, 9], &[10], &[1, 4, 6, 7, 12]];
        let runs: [&[PageNumber]; 4] = [&[1], &[3, 4], &[6, 7, 8], &[0, 11, 13]];
        for set in sets {
            for run in runs {
                let merged = insert_range(set, run);
                assert!(is_strictly_ascending(&merged), "{set:?} + {run:?}");
                let (low, high) = (run[0], run[run.len() - 1]);
                for page in run {
                    assert!(merged.contains(page));
                }
                for page in set.iter().filter(|&&p| p < low || p > high) {
                    assert!(merged.contains(page));
                }
            }
        }
    }

    #[test]
    fn test_contiguous_prefix_and_suffix() {
        let resident = PageSet::from_pages(vec![1, 2, 3, 6, 7]);
        assert_eq!(resident.contiguous_prefix().to_vec(), vec![1, 2, 3]);
        assert_eq!(resident.contiguous_suffix().to_vec(), vec![6, 7]);

        let no_first = PageSet::from_pages(vec![2, 3]);
        assert!(no_first.contiguous_prefix().is_empty());
        assert_eq!(no_first.contiguous_suffix().to_vec(), vec![2, 3]);
    }

    #[test]
    fn test_from_pages_sorts_and_dedups() {
        let set = PageSet::from_pages(vec![4, 1, 4, 2]);
        assert_eq!(set.to_vec(), vec![1, 2, 4]);
        assert!(set.is_well_formed());
        assert!(!set.is_contiguous());
        assert!(PageSet::from_pages(vec![3, 2]).is_contiguous());
        assert!(set.contains(4));
        assert!(!set.contains(3));
    }

    #[test]
    fn test_sentinel_set() {
        let set = PageSet::single(LATEST_PAGE);
        assert!(set.is_latest_sentinel());
        assert!(set.is_well_formed());
        assert!(!PageSet::single(1).is_latest_sentinel());
    }
}
