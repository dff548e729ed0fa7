//! Where a newly created comment lands.

use anyhow::Result;
use board_types::{Comment, PageNumber, PageResult};

use super::page_set::pages_for_count;
use crate::cache::{PageCache, PageKey};
use crate::sources::CommentSource;

/// Page placement of a new comment given the thread count before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub new_count: u64,
    pub page: PageNumber,
    /// Comments on `page` after the insertion (a full page counts as `page_size`).
    pub items_on_page: u64,
}

impl Placement {
    pub fn resolve(prior_count: u64, created: bool, page_size: u32) -> Self {
        let new_count = prior_count + u64::from(created);
        let size = u64::from(page_size.max(1));
        let items_on_page = match new_count % size {
            0 => size,
            rest => rest,
        };
        Self {
            new_count,
            page: pages_for_count(new_count, page_size),
            items_on_page,
        }
    }

    /// The new comment opens a fresh page.
    pub fn opens_page(&self) -> bool {
        self.items_on_page == 1
    }

    /// Page fetched alongside `page` so the jump shows a full page of context.
    pub fn context_page(&self) -> Option<PageNumber> {
        (self.page > 1).then(|| self.page - 1)
    }
}

/// Makes the cache hold the target page (with the new comment) and the page
/// before it. Both operations must succeed for the placement to count.
pub(crate) async fn place<S: CommentSource>(
    cache: &PageCache<S>,
    resource_id: &str,
    placement: Placement,
    comment: Option<Comment>,
) -> Result<()> {
    let target = PageKey::new(resource_id, placement.page);
    let write_directly = comment.is_some() && (cache.contains(&target) || placement.opens_page());

    let fill_target = async {
        match comment {
            Some(comment) if write_directly => {
                cache.write(target.clone(), |prev| {
                    let mut items = prev.map(|page| page.items.clone()).unwrap_or_default();
                    if !items.iter().any(|item| item.id == comment.id) {
                        items.push(comment);
                    }
                    let count = prev.map_or(0, |page| page.count).max(placement.new_count);
                    PageResult::new(count, items)
                });
                Ok(())
            }
            _ => cache.fetch_if_absent(&target).await.map(drop),
        }
    };
    let fill_context = async {
        match placement.context_page() {
            Some(page) => cache
                .fetch_if_absent(&PageKey::new(resource_id, page))
                .await
                .map(drop),
            None => Ok(()),
        }
    };

    futures_util::future::try_join(fill_target, fill_context).await?;
    Ok(())
}
