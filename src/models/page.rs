//! Page model
//!
//! Besides the `Page` entity this module holds the types that describe a
//! listing: [`PageQuery`] says which pages, [`ListParams`] says which slice,
//! and [`PagedResult`] carries the slice back with its total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default page size for public listings
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Upper bound on any requested page size
pub const MAX_PER_PAGE: u32 = 100;

/// A piece of content. Only published pages are publicly visible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: i64,
    pub title: String,
    /// Unique URL-safe slug
    pub slug: String,
    /// Markdown source
    pub content: String,
    /// Rendered HTML, refreshed on every save
    pub content_html: String,
    pub meta_description: String,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// The ID is assigned by the database on insert; the author is set by
    /// the save hooks.
    pub fn new(title: String, slug: String, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            slug,
            content,
            content_html: String::new(),
            meta_description: String::new(),
            author_id: 0,
            category_id: None,
            is_published: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Page fields accepted by the moderation API.
///
/// A missing slug is generated from the title.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

/// Category constraint of a [`PageQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
    In(i64),
    /// Pages without a category
    Uncategorized,
}

/// Which pages a listing selects. Filters combine with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageQuery {
    pub category: Option<CategoryFilter>,
    pub tag: Option<i64>,
    /// Case-insensitive substring over title, content and meta description
    pub search: Option<String>,
    pub exclude: Option<i64>,
    pub published_only: bool,
}

impl PageQuery {
    /// Published pages only; the starting point for every public listing
    pub fn published() -> Self {
        Self {
            published_only: true,
            ..Self::default()
        }
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category = Some(CategoryFilter::In(category_id));
        self
    }

    pub fn uncategorized(mut self) -> Self {
        self.category = Some(CategoryFilter::Uncategorized);
        self
    }

    pub fn with_tag(mut self, tag_id: i64) -> Self {
        self.tag = Some(tag_id);
        self
    }

    pub fn matching(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn excluding(mut self, page_id: i64) -> Self {
        self.exclude = Some(page_id);
        self
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl ListParams {
    /// Page numbers below 1 become 1 and `per_page` is clamped to 1..=100.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// First page with `per_page` items
    pub fn first(per_page: u32) -> Self {
        Self::new(1, per_page)
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * (self.per_page as i64)
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of matching items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn empty(params: &ListParams) -> Self {
        Self::new(Vec::new(), 0, params)
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        let per_page = self.per_page as i64;
        ((self.total + per_page - 1) / per_page) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A page number beyond the last page. Page 1 always exists, even when
    /// nothing matched.
    pub fn is_past_end(&self) -> bool {
        self.page > 1 && self.page > self.total_pages()
    }

    /// Navigation values for templates, which cannot call methods
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages(),
            has_next: self.has_next(),
            has_prev: self.has_prev(),
            next_page: self.has_next().then(|| self.page + 1),
            prev_page: self.has_prev().then(|| self.page - 1),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_params_clamps() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);

        let params = ListParams::new(3, 0);
        assert_eq!(params.per_page, 1);
        assert_eq!(params.offset(), 2);
    }

    #[test]
    fn test_paged_result_navigation() {
        let params = ListParams::new(2, 10);
        let result = PagedResult::new(vec![1, 2, 3], 23, &params);

        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next());
        assert!(result.has_prev());

        let nav = result.pagination();
        assert_eq!(nav.next_page, Some(3));
        assert_eq!(nav.prev_page, Some(1));
    }

    #[test]
    fn test_is_past_end() {
        let beyond: PagedResult<i32> = PagedResult::new(Vec::new(), 12, &ListParams::new(9, 10));
        assert!(beyond.is_past_end());
        assert!(!beyond.has_next());

        let last: PagedResult<i32> = PagedResult::new(vec![1, 2], 12, &ListParams::new(2, 10));
        assert!(!last.is_past_end());

        let empty: PagedResult<i32> = PagedResult::new(Vec::new(), 0, &ListParams::default());
        assert!(!empty.is_past_end());
        assert!(PagedResult::<i32>::new(Vec::new(), 0, &ListParams::new(2, 10)).is_past_end());
    }

    #[test]
    fn test_page_query_builder() {
        let query = PageQuery::published().in_category(4).excluding(7);
        assert!(query.published_only);
        assert_eq!(query.category, Some(CategoryFilter::In(4)));
        assert_eq!(query.exclude, Some(7));
        assert!(query.tag.is_none());
        assert!(!PageQuery::default().published_only);

        let loose = PageQuery::published().uncategorized();
        assert_eq!(loose.category, Some(CategoryFilter::Uncategorized));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_offset_matches_page(page in 1u32..10_000, per_page in 1u32..=100) {
            let params = ListParams::new(page, per_page);
            prop_assert_eq!(params.offset(), (page as i64 - 1) * per_page as i64);
            prop_assert!(params.limit() >= 1 && params.limit() <= 100);
        }

        #[test]
        fn prop_total_pages_covers_total(total in 0i64..5_000, per_page in 1u32..=100) {
            let result: PagedResult<()> = PagedResult::new(Vec::new(), total, &ListParams::new(1, per_page));
            let pages = result.total_pages() as i64;
            prop_assert!(pages * per_page as i64 >= total);
            prop_assert!(pages == 0 || (pages - 1) * (per_page as i64) < total);
        }
    }
}
