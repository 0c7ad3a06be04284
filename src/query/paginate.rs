use crate::options::FetchOrder;
use crate::types::Uid;

use super::collection::MessageCollection;

/// Orders a match set and cuts out the requested page.
///
/// Each surviving UID comes with its position in the listing as the server returned it.
/// `limit` of `None` keeps everything from the start of the ordered set; `page` is 1-based.
pub(crate) fn window(
    matches: &[Uid],
    order: FetchOrder,
    page: usize,
    limit: Option<usize>,
) -> Vec<(usize, Uid)> {
    let mut listed: Vec<(usize, Uid)> = matches.iter().copied().enumerate().collect();
    if order == FetchOrder::Desc {
        listed.reverse();
    }

    match limit {
        Some(limit) => {
            let start = page.max(1).saturating_sub(1).saturating_mul(limit);
            listed.into_iter().skip(start).take(limit).collect()
        }
        None => listed,
    }
}

/// One page of a query's results, with the metadata needed to render page links.
#[derive(Debug)]
pub struct Page {
    items: MessageCollection,
    per_page: usize,
    current_page: usize,
    page_name: String,
}

impl Page {
    pub(crate) fn new(
        items: MessageCollection,
        per_page: usize,
        current_page: usize,
        page_name: String,
    ) -> Page {
        Page {
            items,
            per_page,
            current_page,
            page_name,
        }
    }

    /// The messages on this page.
    pub fn items(&self) -> &MessageCollection {
        &self.items
    }

    pub fn into_items(self) -> MessageCollection {
        self.items
    }

    /// Number of matches across all pages.
    pub fn total(&self) -> usize {
        self.items.total()
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// The query parameter name the page number is carried in.
    pub fn page_name(&self) -> &str {
        &self.page_name
    }

    /// The number of the last page, at least 1.
    pub fn last_page(&self) -> usize {
        if self.per_page == 0 {
            return 1;
        }
        ((self.total() + self.per_page - 1) / self.per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}
