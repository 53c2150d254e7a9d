//! Tag repository

use super::placeholders;
use crate::db::{DynDatabasePool, InsertedId};
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    async fn update(&self, tag: &Tag) -> Result<Tag>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    /// All tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Tags with any of the given ids, ordered by name
    async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>>;

    /// Tags attached to a page, ordered by name
    async fn list_for_page(&self, page_id: i64) -> Result<Vec<Tag>>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! tag_from_row {
    ($row:expr) => {
        Tag {
            id: $row.try_get("id")?,
            name: $row.try_get("name")?,
            slug: $row.try_get("slug")?,
            created_at: $row.try_get("created_at")?,
        }
    };
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        let id = dispatch!(self.pool, |conn| {
            sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
                .bind(&tag.name)
                .bind(&tag.slug)
                .bind(tag.created_at)
                .execute(conn)
                .await
                .context("Failed to create tag")?
                .inserted_id()
        });

        Ok(Tag { id, ..tag.clone() })
    }

    async fn update(&self, tag: &Tag) -> Result<Tag> {
        dispatch!(self.pool, |conn| {
            sqlx::query("UPDATE tags SET name = ?, slug = ? WHERE id = ?")
                .bind(&tag.name)
                .bind(&tag.slug)
                .bind(tag.id)
                .execute(conn)
                .await
                .context("Failed to update tag")?;
        });
        Ok(tag.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // page_tags rows go with the tag (ON DELETE CASCADE)
        let affected = dispatch!(self.pool, |conn| {
            sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete tag")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        dispatch!(self.pool, |conn| {
            let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE id = ?")
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get tag by id")?;
            match row {
                Some(row) => Ok(Some(tag_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        dispatch!(self.pool, |conn| {
            let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE slug = ?")
                .bind(slug)
                .fetch_optional(conn)
                .await
                .context("Failed to get tag by slug")?;
            match row {
                Some(row) => Ok(Some(tag_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        dispatch!(self.pool, |conn| {
            let rows = sqlx::query("SELECT id, name, slug, created_at FROM tags ORDER BY name, id")
                .fetch_all(conn)
                .await
                .context("Failed to list tags")?;
            let mut tags = Vec::with_capacity(rows.len());
            for row in rows {
                tags.push(tag_from_row!(row));
            }
            Ok(tags)
        })
    }

    async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name, slug, created_at FROM tags WHERE id IN ({}) ORDER BY name, id",
            placeholders(ids.len())
        );
        dispatch!(self.pool, |conn| {
            let mut query = sqlx::query(&sql);
            for id in ids {
                query = query.bind(*id);
            }
            let rows = query
                .fetch_all(conn)
                .await
                .context("Failed to list tags by id")?;
            let mut tags = Vec::with_capacity(rows.len());
            for row in rows {
                tags.push(tag_from_row!(row));
            }
            Ok(tags)
        })
    }

    async fn list_for_page(&self, page_id: i64) -> Result<Vec<Tag>> {
        dispatch!(self.pool, |conn| {
            let rows = sqlx::query(
                r#"
                SELECT t.id, t.name, t.slug, t.created_at
                FROM tags t
                INNER JOIN page_tags pt ON pt.tag_id = t.id
                WHERE pt.page_id = ?
                ORDER BY t.name, t.id
                "#,
            )
            .bind(page_id)
            .fetch_all(conn)
            .await
            .context("Failed to list tags for page")?;
            let mut tags = Vec::with_capacity(rows.len());
            for row in rows {
                tags.push(tag_from_row!(row));
            }
            Ok(tags)
        })
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = dispatch!(self.pool, |conn| {
            sqlx::query("SELECT COUNT(*) AS n FROM tags WHERE slug = ? AND id <> ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(conn)
                .await
                .context("Failed to check tag slug")?
                .try_get("n")?
        });
        Ok(count > 0)
    }
}
