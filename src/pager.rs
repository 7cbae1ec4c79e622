use serde::{Deserialize, Serialize};

/// Inclusive 0-based row range, matching the gateway's range-select unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub start: u64,
    pub end: u64,
}

/// Row range covered by one page. Independent of the total count; the
/// arithmetic saturates so even an absurd page index cannot overflow.
pub fn page_range(page_index: u64, page_size: u64) -> RowRange {
    let page_index = page_index.max(1);
    let page_size = page_size.max(1);
    let start = (page_index - 1).saturating_mul(page_size);
    RowRange { start, end: start.saturating_add(page_size - 1) }
}

/// One page of a paginated collection: derived at view time, never persisted.
///
/// `page_index` is 1-based. Out-of-range indices are clamped rather than
/// rejected so navigation past the ends is a no-op for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page_index: u64,
    page_size: u64,
    total_count: u64,
}

impl PageWindow {
    pub fn new(page_index: u64, page_size: u64, total_count: u64) -> Self {
        Self {
            page_index: page_index.max(1),
            page_size: page_size.max(1),
            total_count,
        }
    }

    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// An empty collection still renders as a single empty page.
    pub fn total_pages(&self) -> u64 {
        self.total_count.div_ceil(self.page_size).max(1)
    }

    pub fn range(&self) -> RowRange {
        page_range(self.page_index, self.page_size)
    }

    pub fn has_previous(&self) -> bool {
        self.page_index > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_index < self.total_pages()
    }

    /// Whether `page` is a valid navigation target.
    pub fn contains_page(&self, page: u64) -> bool {
        (1..=self.total_pages()).contains(&page)
    }
}
