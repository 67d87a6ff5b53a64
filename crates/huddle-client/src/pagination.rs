//! Offset-based history paging for one chat session.

use huddle_shared::constants::DEFAULT_PAGE_SIZE;

/// Offset and limit of the next page to request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

/// Tracks whether older history remains.
///
/// Pages are requested strictly in sequence: the next offset is always the
/// number of messages already loaded, so the loaded range never has a gap.
#[derive(Debug, Clone)]
pub struct HistoryPager {
    page_size: usize,
    has_more: bool,
    pages_loaded: usize,
}

impl HistoryPager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            has_more: true,
            pages_loaded: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    /// The newest page, requested when a session opens.
    pub fn first_page(&self) -> PageWindow {
        PageWindow {
            offset: 0,
            limit: self.page_size,
        }
    }

    /// The next older page, if one may be requested with `loaded` messages
    /// in the store.
    ///
    /// Nothing is returned once a short page has been seen, or before the
    /// first full page is loaded.
    pub fn next_page(&self, loaded: usize) -> Option<PageWindow> {
        if !self.has_more || loaded < self.page_size {
            return None;
        }
        Some(PageWindow {
            offset: loaded,
            limit: self.page_size,
        })
    }

    /// Record a page of `len` messages. A short page ends the history.
    pub fn record_page(&mut self, len: usize) {
        self.pages_loaded += 1;
        if len < self.page_size {
            self.has_more = false;
        }
    }
}

impl Default for HistoryPager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
