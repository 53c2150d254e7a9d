//! Shared API response types

use serde::Serialize;

use crate::models::{Category, Page, PagedResult, Pagination, Tag};

/// One page of a page listing
#[derive(Debug, Serialize)]
pub struct PageListResponse {
    pub pages: Vec<Page>,
    pub pagination: Pagination,
}

impl From<PagedResult<Page>> for PageListResponse {
    fn from(result: PagedResult<Page>) -> Self {
        let pagination = result.pagination();
        Self {
            pages: result.items,
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryPagesResponse {
    pub category: Category,
    #[serde(flatten)]
    pub listing: PageListResponse,
}

#[derive(Debug, Serialize)]
pub struct TagPagesResponse {
    pub tag: Tag,
    #[serde(flatten)]
    pub listing: PageListResponse,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// The `q` parameter as sent
    pub query: String,
    #[serde(flatten)]
    pub listing: PageListResponse,
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<Tag>,
}

/// Result of a bulk contact update
#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}
