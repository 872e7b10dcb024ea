//! This modules defines the common functionality for paging data.

use serde::Serialize;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The number of items per page when not specified in a request.
    pub default_limit: u64,
    /// The largest page size a client may request.
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// The window of rows to fetch for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The number of rows to skip.
    pub offset: u64,
    /// The maximum number of rows to return.
    pub limit: u64,
}

impl PaginationConfig {
    /// Build a page request from optional client values.
    ///
    /// A missing limit falls back to the default and the limit is clamped to
    /// `1..=max_limit`.
    pub fn page_request(&self, offset: Option<u64>, limit: Option<u64>) -> PageRequest {
        let limit = limit
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1));

        PageRequest {
            offset: offset.unwrap_or(0),
            limit,
        }
    }
}

/// Describes where a page sits within the full result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// The number of rows skipped.
    pub offset: u64,
    /// The page size used.
    pub limit: u64,
    /// The number of rows matching the query across all pages.
    pub total: u64,
    /// Whether there are rows after this page.
    pub has_next: bool,
}

impl Pagination {
    /// Describe the page `request` of a result set with `total` rows.
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            offset: request.offset,
            limit: request.limit,
            total,
            has_next: request.offset.saturating_add(request.limit) < total,
        }
    }
}
