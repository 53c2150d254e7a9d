//! Page repository
//!
//! Listings are driven by a [`PageQuery`]: its filters become a `WHERE`
//! clause shared by [`PageRepository::query`] and [`PageRepository::count`],
//! so a page of results and its total always agree.

use super::contains_pattern;
use crate::db::{DynDatabasePool, InsertedId};
use crate::models::{CategoryFilter, ListParams, Page, PageQuery};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn create(&self, page: &Page) -> Result<Page>;

    async fn update(&self, page: &Page) -> Result<Page>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>>;

    /// Look up a page by slug regardless of its published flag
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Pages matching `query`, newest first, sliced by `params`
    async fn query(&self, query: &PageQuery, params: &ListParams) -> Result<Vec<Page>>;

    /// Total number of pages matching `query`
    async fn count(&self, query: &PageQuery) -> Result<i64>;

    /// Replace the page's tag set
    async fn set_tags(&self, page_id: i64, tag_ids: &[i64]) -> Result<()>;
}

pub struct SqlxPageRepository {
    pool: DynDatabasePool,
}

impl SqlxPageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PageRepository> {
        Arc::new(Self::new(pool))
    }
}

const PAGE_COLUMNS: &str = "id, title, slug, content, content_html, meta_description, \
     author_id, category_id, is_published, created_at, updated_at";

macro_rules! page_from_row {
    ($row:expr) => {
        Page {
            id: $row.try_get("id")?,
            title: $row.try_get("title")?,
            slug: $row.try_get("slug")?,
            content: $row.try_get("content")?,
            content_html: $row.try_get("content_html")?,
            meta_description: $row.try_get("meta_description")?,
            author_id: $row.try_get("author_id")?,
            category_id: $row.try_get("category_id")?,
            is_published: $row.try_get("is_published")?,
            created_at: $row.try_get("created_at")?,
            updated_at: $row.try_get("updated_at")?,
        }
    };
}

/// A value bound into a generated `WHERE` clause
#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Int(i64),
    Text(String),
    Bool(bool),
}

/// Translate a query into ` WHERE ...` (or an empty string) plus its
/// bind values in placeholder order.
fn filter_clause(query: &PageQuery) -> (String, Vec<FilterArg>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut args = Vec::new();

    if query.published_only {
        conditions.push("is_published = ?");
        args.push(FilterArg::Bool(true));
    }
    match query.category {
        Some(CategoryFilter::In(category_id)) => {
            conditions.push("category_id = ?");
            args.push(FilterArg::Int(category_id));
        }
        Some(CategoryFilter::Uncategorized) => conditions.push("category_id IS NULL"),
        None => {}
    }
    if let Some(tag_id) = query.tag {
        conditions.push("id IN (SELECT page_id FROM page_tags WHERE tag_id = ?)");
        args.push(FilterArg::Int(tag_id));
    }
    if let Some(term) = &query.search {
        conditions.push(
            "(LOWER(title) LIKE ? ESCAPE '!' \
              OR LOWER(content) LIKE ? ESCAPE '!' \
              OR LOWER(meta_description) LIKE ? ESCAPE '!')",
        );
        let pattern = contains_pattern(term);
        for _ in 0..3 {
            args.push(FilterArg::Text(pattern.clone()));
        }
    }
    if let Some(page_id) = query.exclude {
        conditions.push("id <> ?");
        args.push(FilterArg::Int(page_id));
    }

    if conditions.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), args)
    }
}

/// Bind filter values onto a query in order
macro_rules! bind_filters {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args {
            query = match arg {
                FilterArg::Int(v) => query.bind(*v),
                FilterArg::Text(v) => query.bind(v.clone()),
                FilterArg::Bool(v) => query.bind(*v),
            };
        }
        query
    }};
}

#[async_trait]
impl PageRepository for SqlxPageRepository {
    async fn create(&self, page: &Page) -> Result<Page> {
        let id = dispatch!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO pages (title, slug, content, content_html, meta_description,
                                   author_id, category_id, is_published, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&page.title)
            .bind(&page.slug)
            .bind(&page.content)
            .bind(&page.content_html)
            .bind(&page.meta_description)
            .bind(page.author_id)
            .bind(page.category_id)
            .bind(page.is_published)
            .bind(page.created_at)
            .bind(page.updated_at)
            .execute(conn)
            .await
            .context("Failed to create page")?
            .inserted_id()
        });

        Ok(Page { id, ..page.clone() })
    }

    async fn update(&self, page: &Page) -> Result<Page> {
        dispatch!(self.pool, |conn| {
            sqlx::query(
                r#"
                UPDATE pages
                SET title = ?, slug = ?, content = ?, content_html = ?, meta_description = ?,
                    author_id = ?, category_id = ?, is_published = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&page.title)
            .bind(&page.slug)
            .bind(&page.content)
            .bind(&page.content_html)
            .bind(&page.meta_description)
            .bind(page.author_id)
            .bind(page.category_id)
            .bind(page.is_published)
            .bind(page.updated_at)
            .bind(page.id)
            .execute(conn)
            .await
            .context("Failed to update page")?;
        });
        Ok(page.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = dispatch!(self.pool, |conn| {
            sqlx::query("DELETE FROM pages WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete page")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>> {
        let sql = format!("SELECT {} FROM pages WHERE id = ?", PAGE_COLUMNS);
        dispatch!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get page by id")?;
            match row {
                Some(row) => Ok(Some(page_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        let sql = format!("SELECT {} FROM pages WHERE slug = ?", PAGE_COLUMNS);
        dispatch!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(conn)
                .await
                .context("Failed to get page by slug")?;
            match row {
                Some(row) => Ok(Some(page_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = dispatch!(self.pool, |conn| {
            sqlx::query("SELECT COUNT(*) AS n FROM pages WHERE slug = ? AND id <> ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(conn)
                .await
                .context("Failed to check page slug")?
                .try_get("n")?
        });
        Ok(count > 0)
    }

    async fn query(&self, query: &PageQuery, params: &ListParams) -> Result<Vec<Page>> {
        let (clause, args) = filter_clause(query);
        let sql = format!(
            "SELECT {} FROM pages{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            PAGE_COLUMNS, clause
        );
        dispatch!(self.pool, |conn| {
            let rows = bind_filters!(sqlx::query(&sql), &args)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to query pages")?;
            let mut pages = Vec::with_capacity(rows.len());
            for row in rows {
                pages.push(page_from_row!(row));
            }
            Ok(pages)
        })
    }

    async fn count(&self, query: &PageQuery) -> Result<i64> {
        let (clause, args) = filter_clause(query);
        let sql = format!("SELECT COUNT(*) AS n FROM pages{}", clause);
        let count: i64 = dispatch!(self.pool, |conn| {
            bind_filters!(sqlx::query(&sql), &args)
                .fetch_one(conn)
                .await
                .context("Failed to count pages")?
                .try_get("n")?
        });
        Ok(count)
    }

    async fn set_tags(&self, page_id: i64, tag_ids: &[i64]) -> Result<()> {
        let mut unique: Vec<i64> = tag_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        dispatch!(self.pool, |conn| {
            let mut tx = conn.begin().await.context("Failed to begin transaction")?;
            sqlx::query("DELETE FROM page_tags WHERE page_id = ?")
                .bind(page_id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear page tags")?;
            for tag_id in &unique {
                sqlx::query("INSERT INTO page_tags (page_id, tag_id) VALUES (?, ?)")
                    .bind(page_id)
                    .bind(*tag_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to attach tag to page")?;
            }
            tx.commit().await.context("Failed to commit page tags")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, Utc};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPageRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query("INSERT INTO users (username, email) VALUES ('admin', 'a@example.com')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO categories (name, slug) VALUES ('Rust', 'rust'), ('Go', 'go')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO tags (name, slug) VALUES ('async', 'async')")
            .execute(sqlite)
            .await
            .unwrap();
        let repo = SqlxPageRepository::new(pool.clone());
        (pool, repo)
    }

    /// Insert a page created `age_minutes` ago
    async fn insert_page(
        repo: &SqlxPageRepository,
        slug: &str,
        category_id: Option<i64>,
        published: bool,
        age_minutes: i64,
    ) -> Page {
        let mut page = Page::new(
            format!("Title {}", slug),
            slug.to_string(),
            format!("Body of {}", slug),
        );
        page.author_id = 1;
        page.category_id = category_id;
        page.is_published = published;
        page.created_at = Utc::now() - Duration::minutes(age_minutes);
        page.updated_at = page.created_at;
        repo.create(&page).await.expect("Failed to create page")
    }

    #[test]
    fn test_filter_clause_empty_query() {
        let (clause, args) = filter_clause(&PageQuery::default());
        assert!(clause.is_empty());
        assert!(args.is_empty());
    }

    #[test]
    fn test_filter_clause_orders_args_with_placeholders() {
        let query = PageQuery::published().in_category(3).matching("Rust").excluding(9);
        let (clause, args) = filter_clause(&query);

        assert_eq!(clause.matches('?').count(), args.len());
        assert_eq!(args[0], FilterArg::Bool(true));
        assert_eq!(args[1], FilterArg::Int(3));
        assert_eq!(args[2], FilterArg::Text("%rust%".to_string()));
        assert_eq!(args[5], FilterArg::Int(9));
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let (_pool, repo) = setup_test_repo().await;
        let created = insert_page(&repo, "hello", Some(1), true, 0).await;

        let by_slug = repo.get_by_slug("hello").await.unwrap().unwrap();
        assert_eq!(by_slug.id, created.id);
        assert_eq!(by_slug.category_id, Some(1));
        assert!(by_slug.is_published);
        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_published_newest_first() {
        let (_pool, repo) = setup_test_repo().await;
        insert_page(&repo, "old", None, true, 30).await;
        insert_page(&repo, "new", None, true, 1).await;
        insert_page(&repo, "draft", None, false, 0).await;

        let query = PageQuery::published();
        let pages = repo.query(&query, &ListParams::default()).await.unwrap();
        let slugs: Vec<&str> = pages.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["new", "old"]);
        assert_eq!(repo.count(&query).await.unwrap(), 2);
        assert_eq!(repo.count(&PageQuery::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_query_paginates() {
        let (_pool, repo) = setup_test_repo().await;
        for i in 0..5 {
            insert_page(&repo, &format!("p{}", i), None, true, i).await;
        }

        let query = PageQuery::published();
        let second = repo.query(&query, &ListParams::new(2, 2)).await.unwrap();
        let slugs: Vec<&str> = second.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["p2", "p3"]);

        let beyond = repo.query(&query, &ListParams::new(10, 2)).await.unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn test_query_by_category_and_exclude() {
        let (_pool, repo) = setup_test_repo().await;
        let a = insert_page(&repo, "a", Some(1), true, 3).await;
        insert_page(&repo, "b", Some(1), true, 2).await;
        insert_page(&repo, "c", Some(2), true, 1).await;

        let query = PageQuery::published().in_category(1).excluding(a.id);
        let pages = repo.query(&query, &ListParams::default()).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].slug, "b");
    }

    #[tokio::test]
    async fn test_query_uncategorized() {
        let (_pool, repo) = setup_test_repo().await;
        let loose = insert_page(&repo, "loose", None, true, 2).await;
        insert_page(&repo, "also-loose", None, true, 1).await;
        insert_page(&repo, "filed", Some(1), true, 0).await;

        let query = PageQuery::published().uncategorized().excluding(loose.id);
        let pages = repo.query(&query, &ListParams::default()).await.unwrap();
        let slugs: Vec<&str> = pages.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["also-loose"]);
        assert_eq!(repo.count(&PageQuery::published().uncategorized()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_by_tag() {
        let (_pool, repo) = setup_test_repo().await;
        let tagged = insert_page(&repo, "tagged", None, true, 1).await;
        insert_page(&repo, "plain", None, true, 0).await;
        repo.set_tags(tagged.id, &[1, 1]).await.unwrap();

        let pages = repo
            .query(&PageQuery::published().with_tag(1), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, tagged.id);

        repo.set_tags(tagged.id, &[]).await.unwrap();
        assert_eq!(repo.count(&PageQuery::published().with_tag(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_across_fields() {
        let (_pool, repo) = setup_test_repo().await;
        let mut described = insert_page(&repo, "described", None, true, 2).await;
        described.meta_description = "All about Ferris".to_string();
        repo.update(&described).await.unwrap();
        insert_page(&repo, "other", None, true, 1).await;

        let by_meta = repo
            .query(&PageQuery::published().matching("FERRIS"), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(by_meta.len(), 1);
        assert_eq!(by_meta[0].slug, "described");

        let by_title = repo
            .count(&PageQuery::published().matching("title"))
            .await
            .unwrap();
        assert_eq!(by_title, 2);

        let wildcard = repo
            .count(&PageQuery::published().matching("%"))
            .await
            .unwrap();
        assert_eq!(wildcard, 0);
    }

    #[tokio::test]
    async fn test_slug_exists_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let page = insert_page(&repo, "unique", None, true, 0).await;

        assert!(repo.slug_exists("unique", None).await.unwrap());
        assert!(!repo.slug_exists("unique", Some(page.id)).await.unwrap());

        assert!(repo.delete(page.id).await.unwrap());
        assert!(repo.get_by_id(page.id).await.unwrap().is_none());
    }
}
