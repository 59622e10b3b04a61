//! Pages, pagination counters and read queries

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of pages needed for `total_elements` at `page_size` per page.
///
/// Returns 0 when `page_size` is 0.
pub fn total_pages(total_elements: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        total_elements.div_ceil(page_size)
    }
}

/// A single bounded slice of a server-side collection.
///
/// Deserializes leniently: both `pageIndex`/`pageSize` and Spring-style
/// `number`/`size` are accepted, and missing counters fall back to values
/// inferred from `content` (`totalElements = content.len()`,
/// `totalPages = 1`, `pageIndex = 0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    from = "RawPage<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: usize,
    pub total_pages: usize,
    pub page_index: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    /// Build a page, deriving `total_pages` from the other counters.
    pub fn new(
        content: Vec<T>,
        total_elements: usize,
        page_index: usize,
        page_size: usize,
    ) -> Self {
        Self {
            content,
            total_elements,
            total_pages: total_pages(total_elements, page_size),
            page_index,
            page_size,
        }
    }

    /// An empty first page.
    pub fn empty(page_size: usize) -> Self {
        Self::new(Vec::new(), 0, 0, page_size)
    }

    /// Counters of this page.
    ///
    /// When `page_size > 0` the page count is recomputed from
    /// `total_elements` so cached pagination always satisfies
    /// `total_pages == ceil(total_elements / page_size)`.
    pub fn pagination(&self) -> Pagination {
        let total_pages = if self.page_size > 0 {
            total_pages(self.total_elements, self.page_size)
        } else {
            self.total_pages
        };
        Pagination {
            total_elements: self.total_elements,
            total_pages,
            page_index: self.page_index,
            page_size: self.page_size,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPage<T> {
    #[serde(default = "Vec::new")]
    content: Vec<T>,
    total_elements: Option<usize>,
    total_pages: Option<usize>,
    #[serde(alias = "number")]
    page_index: Option<usize>,
    #[serde(alias = "size")]
    page_size: Option<usize>,
}

impl<T> From<RawPage<T>> for Page<T> {
    fn from(raw: RawPage<T>) -> Self {
        let total_elements = raw.total_elements.unwrap_or(raw.content.len());
        let page_size = raw.page_size.unwrap_or(0);
        let total_pages = match raw.total_pages {
            Some(pages) => pages,
            None if raw.total_elements.is_some() && page_size > 0 => {
                total_pages(total_elements, page_size)
            }
            None => 1,
        };
        Self {
            content: raw.content,
            total_elements,
            total_pages,
            page_index: raw.page_index.unwrap_or(0),
            page_size,
        }
    }
}

/// Pagination counters cached alongside the current page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_elements: usize,
    pub total_pages: usize,
    pub page_index: usize,
    pub page_size: usize,
}

impl Pagination {
    /// Empty counters for the given page size.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Recompute `total_pages` after `total_elements` changed.
    pub fn recompute(&mut self) {
        self.total_pages = total_pages(self.total_elements, self.page_size);
    }

    pub fn has_next_page(&self) -> bool {
        self.page_index.saturating_add(1) < self.total_pages
    }

    pub fn has_previous_page(&self) -> bool {
        self.page_index > 0
    }
}

/// Sort direction for list requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Parameters of a plain (optionally filtered) list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page_index: usize,
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
    /// Entity-specific read filters (e.g. `status=ACTIVE`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn page(page_index: usize, page_size: usize) -> Self {
        Self {
            page_index,
            page_size,
            ..Self::default()
        }
    }

    pub fn sorted(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(field.into());
        self.direction = Some(direction);
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Parameters of a free-text search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub term: String,
    pub page_index: usize,
    pub page_size: usize,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>, page_index: usize, page_size: usize) -> Self {
        Self {
            term: term.into(),
            page_index,
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_page_deserialize_camel_case() {
        let page: Page<u32> = serde_json::from_str(
            r#"{"content":[1,2],"totalElements":12,"totalPages":2,"pageIndex":1,"pageSize":10}"#,
        )
        .unwrap();
        assert_eq!(page, Page::new(vec![1, 2], 12, 1, 10));
    }

    #[test]
    fn test_page_deserialize_spring_style() {
        let page: Page<u32> = serde_json::from_str(
            r#"{"content":[1],"totalElements":21,"totalPages":3,"number":2,"size":10}"#,
        )
        .unwrap();
        assert_eq!(page.page_index, 2);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_page_deserialize_missing_counters() {
        let page: Page<u32> = serde_json::from_str(r#"{"content":[4,5,6]}"#).unwrap();
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page_index, 0);
        assert_eq!(page.page_size, 0);
    }

    #[test]
    fn test_page_deserialize_missing_total_pages_is_derived() {
        let page: Page<u32> =
            serde_json::from_str(r#"{"content":[1],"totalElements":25,"pageSize":10}"#).unwrap();
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_page_deserialize_missing_content() {
        let page: Page<u32> = serde_json::from_str(r#"{}"#).unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 0);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_pagination_recomputes_inconsistent_total_pages() {
        let page = Page {
            content: vec![1u32],
            total_elements: 30,
            total_pages: 7,
            page_index: 0,
            page_size: 10,
        };
        assert_eq!(page.pagination().total_pages, 3);
    }

    #[test]
    fn test_pagination_navigation() {
        let mut p = Pagination::with_page_size(10);
        p.total_elements = 25;
        p.recompute();
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page());
        assert!(!p.has_previous_page());

        p.page_index = 2;
        assert!(!p.has_next_page());
        assert!(p.has_previous_page());

        p.page_index = usize::MAX;
        assert!(!p.has_next_page());
    }

    #[test]
    fn test_list_query_builder_serializes_filters() {
        let query = ListQuery::page(1, 20)
            .sorted("lastName", SortDirection::Desc)
            .filter("status", "ACTIVE");
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["pageIndex"], 1);
        assert_eq!(json["direction"], "desc");
        assert_eq!(json["filters"]["status"], "ACTIVE");
    }
}
