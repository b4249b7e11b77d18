//! List request parameters.

use schemata_core::{FieldError, ValidationError};
use schemata_schema::SortOrder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Query parameters for listing instances.
///
/// Supports pagination, free-text search, sorting and exact-match filters.
/// Unset members fall back to the object's display defaults and the
/// configured page size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListParams {
    /// The page number (1-indexed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// The number of items per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    /// Column to sort by: an object field, `id`, `created_at` or `updated_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    /// Sort direction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    /// Case-insensitive substring matched across the searchable fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Exact-match filters keyed by field short name (or `id`).
    pub filters: Map<String, Json>,
}

impl ListParams {
    /// Creates default list parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page number.
    #[must_use]
    pub const fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Sets the sort column.
    #[must_use]
    pub fn sort_by(mut self, column: impl Into<String>) -> Self {
        self.sort_by = Some(column.into());
        self
    }

    /// Sets the sort direction.
    #[must_use]
    pub const fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    /// Sets the search query.
    #[must_use]
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    /// Adds a filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Json>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// The trimmed search term, if any is left after trimming.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Resolves page and page size against the configured limits.
    ///
    /// # Errors
    ///
    /// Returns a validation error for page 0 or page size 0.
    pub fn paging(&self, limits: PageLimits) -> Result<PageRequest, ValidationError> {
        let mut errors = Vec::new();
        let page = self.page.unwrap_or(1);
        if page == 0 {
            errors.push(FieldError::new("page", "invalid", "Page must be at least 1."));
        }
        let page_size = self.page_size.unwrap_or(limits.default_page_size);
        if page_size == 0 {
            errors.push(FieldError::new(
                "pageSize",
                "invalid",
                "Page size must be at least 1.",
            ));
        }
        ValidationError::check("Invalid paging parameters.", errors)?;
        Ok(PageRequest {
            page,
            page_size: page_size.min(limits.max_page_size.max(1)),
        })
    }
}

/// Configured page size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Page size used when a request names none.
    pub default_page_size: u64,
    /// Larger requested page sizes are clamped to this.
    pub max_page_size: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The page number (1-indexed).
    pub page: u64,
    /// The effective page size.
    pub page_size: u64,
}

impl PageRequest {
    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.page_size)
            .min(i64::MAX as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let paging = ListParams::new().paging(PageLimits::default()).unwrap();
        assert_eq!(paging, PageRequest { page: 1, page_size: 20 });
        assert_eq!(paging.offset(), 0);
    }

    #[test]
    fn test_page_size_clamped() {
        let paging = ListParams::new()
            .page(3)
            .page_size(500)
            .paging(PageLimits::default())
            .unwrap();
        assert_eq!(paging.page_size, 100);
        assert_eq!(paging.offset(), 200);
    }

    #[test]
    fn test_zero_page_and_size_rejected() {
        let err = ListParams::new()
            .page(0)
            .page_size(0)
            .paging(PageLimits::default())
            .unwrap_err();
        assert!(err.has_field("page"));
        assert!(err.has_field("pageSize"));
    }

    #[test]
    fn test_huge_page_offset_saturates() {
        let paging = PageRequest {
            page: u64::MAX,
            page_size: 100,
        };
        assert_eq!(paging.offset(), i64::MAX as u64);
    }

    #[test]
    fn test_search_term_trimmed() {
        assert_eq!(ListParams::new().search("  ada ").search_term(), Some("ada"));
        assert_eq!(ListParams::new().search("   ").search_term(), None);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let params: ListParams = serde_json::from_value(json!({
            "page": 2,
            "pageSize": 10,
            "sortBy": "name",
            "sortOrder": "desc",
            "filters": {"status": "open"}
        }))
        .unwrap();
        assert_eq!(
            params,
            ListParams::new()
                .page(2)
                .page_size(10)
                .sort_by("name")
                .sort_order(SortOrder::Desc)
                .filter("status", "open")
        );
    }
}
