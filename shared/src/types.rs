//! Common types used across the platform

use serde::{Deserialize, Deserializer, Serialize};

/// Page size used when a list request does not ask for one
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Upper bound on any single page
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Pagination parameters, 1-indexed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Pagination {
    /// Build from raw query values. Missing or zero values fall back to the
    /// defaults and the page size is capped at `max_limit`.
    pub fn from_query(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let per_page = limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(max_limit);

        Self { page, per_page }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn meta(&self, total_items: u64) -> PaginationMeta {
        let per_page = u64::from(self.per_page.max(1));
        PaginationMeta {
            page: self.page,
            per_page: self.per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page) as u32,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total_items: u64) -> Self {
        Self {
            data,
            pagination: pagination.meta(total_items),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

// ============================================================================
// Partial updates
// ============================================================================

/// Deserialize a nullable field of a partial update.
///
/// Use with `#[serde(default, deserialize_with = "shared::patch_field")]` on an
/// `Option<Option<T>>`: an absent key stays `None` (leave unchanged), an
/// explicit `null` becomes `Some(None)` (clear), a value becomes `Some(Some(v))`.
pub fn patch_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Merge one partial-update field into the stored value
pub fn apply_patch<T>(current: Option<T>, patch: Option<Option<T>>) -> Option<T> {
    match patch {
        Some(value) => value,
        None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let p = Pagination::from_query(None, None, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 50);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_limit_capped() {
        let p = Pagination::from_query(Some(3), Some(500), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        assert_eq!(p.per_page, 100);
        assert_eq!(p.offset(), 200);
    }

    #[test]
    fn test_zero_page_is_first_page() {
        let p = Pagination::from_query(Some(0), Some(0), 20, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 20);
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "patch_field")]
        note: Option<Option<String>>,
    }

    #[test]
    fn test_patch_distinguishes_absent_and_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"note": "x"}"#).unwrap();

        let stored = Some("old".to_string());
        assert_eq!(apply_patch(stored.clone(), absent.note), Some("old".to_string()));
        assert_eq!(apply_patch(stored.clone(), null.note), None);
        assert_eq!(apply_patch(stored, set.note), Some("x".to_string()));
    }

    #[test]
    fn test_meta_total_pages() {
        let p = Pagination { page: 1, per_page: 20 };
        assert_eq!(p.meta(0).total_pages, 0);
        assert_eq!(p.meta(20).total_pages, 1);
        assert_eq!(p.meta(21).total_pages, 2);
    }
}
