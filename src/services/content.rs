//! Content service
//!
//! Read side of the site: published page listings, search, page detail and
//! the navigation context every public view shares. Each listing builds a
//! [`PageQuery`] and hands it to the page repository together with the
//! requested [`ListParams`].

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{CategoryRepository, PageRepository, TagRepository};
use crate::models::{Category, ListParams, Page, PageQuery, PagedResult, Tag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Number of related pages shown under a page
pub const RELATED_LIMIT: u32 = 3;

/// Number of recent pages in the sidebar and on the landing page
pub const RECENT_LIMIT: u32 = 5;

/// Number of categories in the sidebar
pub const SIDEBAR_CATEGORY_LIMIT: i64 = 5;

const CACHE_KEY_SIDEBAR: &str = "content:sidebar";
const CACHE_KEY_LANDING: &str = "content:landing";
const CACHE_KEY_PATTERN: &str = "content:*";

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A published page with everything its detail view shows
#[derive(Debug, Clone, Serialize)]
pub struct PageDetail {
    pub page: Page,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
    /// Up to three newest-first pages from the same category, or other
    /// uncategorized pages when the page has none
    pub related: Vec<Page>,
}

/// Navigation shared by every listing view
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sidebar {
    pub recent_pages: Vec<Page>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Landing {
    pub categories: Vec<Category>,
    pub recent_pages: Vec<Page>,
}

pub struct ContentService {
    pages: Arc<dyn PageRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl ContentService {
    pub fn new(
        pages: Arc<dyn PageRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            pages,
            categories,
            tags,
            cache,
            cache_ttl,
        }
    }

    /// One page of `query`. A page past the last one is `NotFound`; the
    /// first page of an empty listing is not.
    async fn run(&self, query: PageQuery, params: &ListParams) -> Result<PagedResult<Page>, ContentError> {
        let total = self.pages.count(&query).await?;
        let items = self.pages.query(&query, params).await?;
        in_range(PagedResult::new(items, total, params))
    }

    /// Published pages, newest first
    pub async fn list_published(&self, params: &ListParams) -> Result<PagedResult<Page>, ContentError> {
        self.run(PageQuery::published(), params).await
    }

    pub async fn list_by_category_slug(
        &self,
        slug: &str,
        params: &ListParams,
    ) -> Result<(Category, PagedResult<Page>), ContentError> {
        let category = self
            .categories
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("category '{}'", slug)))?;

        let pages = self
            .run(PageQuery::published().in_category(category.id), params)
            .await?;
        Ok((category, pages))
    }

    pub async fn list_by_tag_slug(
        &self,
        slug: &str,
        params: &ListParams,
    ) -> Result<(Tag, PagedResult<Page>), ContentError> {
        let tag = self
            .tags
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("tag '{}'", slug)))?;

        let pages = self.run(PageQuery::published().with_tag(tag.id), params).await?;
        Ok((tag, pages))
    }

    /// Case-insensitive search over title, content and meta description.
    ///
    /// A blank query matches nothing.
    pub async fn search(&self, query: &str, params: &ListParams) -> Result<PagedResult<Page>, ContentError> {
        let term = query.trim();
        if term.is_empty() {
            return in_range(PagedResult::empty(params));
        }
        self.run(PageQuery::published().matching(term), params).await
    }

    /// A published page by slug; drafts are reported as not found
    pub async fn get_published(&self, slug: &str) -> Result<PageDetail, ContentError> {
        let page = self
            .pages
            .get_by_slug(slug)
            .await?
            .filter(|page| page.is_published)
            .ok_or_else(|| ContentError::NotFound(format!("page '{}'", slug)))?;

        let category = match page.category_id {
            Some(id) => self.categories.get_by_id(id).await?,
            None => None,
        };
        let tags = self.tags.list_for_page(page.id).await?;

        // Uncategorized pages are related to each other
        let siblings = match page.category_id {
            Some(category_id) => PageQuery::published().in_category(category_id),
            None => PageQuery::published().uncategorized(),
        };
        let related = self
            .pages
            .query(&siblings.excluding(page.id), &ListParams::first(RELATED_LIMIT))
            .await?;

        Ok(PageDetail {
            page,
            category,
            tags,
            related,
        })
    }

    /// Recent pages and a few categories, cached
    pub async fn sidebar(&self) -> Result<Sidebar, ContentError> {
        if let Some(sidebar) = self.cache.get::<Sidebar>(CACHE_KEY_SIDEBAR).await.ok().flatten() {
            return Ok(sidebar);
        }

        let sidebar = Sidebar {
            recent_pages: self.recent_pages().await?,
            categories: self.categories.list(Some(SIDEBAR_CATEGORY_LIMIT)).await?,
        };

        if let Err(e) = self.cache.set(CACHE_KEY_SIDEBAR, &sidebar, self.cache_ttl).await {
            tracing::warn!("Failed to cache sidebar: {}", e);
        }
        Ok(sidebar)
    }

    /// Every category and the most recent pages, cached
    pub async fn landing(&self) -> Result<Landing, ContentError> {
        if let Some(landing) = self.cache.get::<Landing>(CACHE_KEY_LANDING).await.ok().flatten() {
            return Ok(landing);
        }

        let landing = Landing {
            categories: self.categories.list(None).await?,
            recent_pages: self.recent_pages().await?,
        };

        if let Err(e) = self.cache.set(CACHE_KEY_LANDING, &landing, self.cache_ttl).await {
            tracing::warn!("Failed to cache landing context: {}", e);
        }
        Ok(landing)
    }

    async fn recent_pages(&self) -> Result<Vec<Page>, ContentError> {
        Ok(self
            .pages
            .query(&PageQuery::published(), &ListParams::first(RECENT_LIMIT))
            .await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ContentError> {
        Ok(self.categories.list(None).await?)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>, ContentError> {
        Ok(self.tags.list().await?)
    }

    /// Drop cached navigation after content changes
    pub async fn invalidate_sidebar(&self) {
        if let Err(e) = self.cache.delete_pattern(CACHE_KEY_PATTERN).await {
            tracing::warn!("Failed to invalidate content cache: {}", e);
        }
    }
}

fn in_range(result: PagedResult<Page>) -> Result<PagedResult<Page>, ContentError> {
    if result.is_past_end() {
        return Err(ContentError::NotFound(format!("page {}", result.page)));
    }
    Ok(result)
}
