//! Category repository

use crate::db::{DynDatabasePool, InsertedId};
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<Category>;

    async fn update(&self, category: &Category) -> Result<Category>;

    /// Returns false when no row matched. Pages in the category keep
    /// existing with no category.
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// List categories by name, optionally capped at `limit`
    async fn list(&self, limit: Option<i64>) -> Result<Vec<Category>>;

    /// Whether another category already uses `slug`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Whether another category already uses `name`
    async fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }

    async fn exists_where(&self, column: &str, value: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) AS n FROM categories WHERE {} = ? AND id <> ?",
            column
        );
        let count: i64 = dispatch!(self.pool, |conn| {
            sqlx::query(&sql)
                .bind(value)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(conn)
                .await
                .context("Failed to check category uniqueness")?
                .try_get("n")?
        });
        Ok(count > 0)
    }
}

const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at";

macro_rules! category_from_row {
    ($row:expr) => {
        Category {
            id: $row.try_get("id")?,
            name: $row.try_get("name")?,
            slug: $row.try_get("slug")?,
            description: $row.try_get("description")?,
            created_at: $row.try_get("created_at")?,
        }
    };
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        let id = dispatch!(self.pool, |conn| {
            sqlx::query(
                "INSERT INTO categories (name, slug, description, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(category.created_at)
            .execute(conn)
            .await
            .context("Failed to create category")?
            .inserted_id()
        });

        Ok(Category {
            id,
            ..category.clone()
        })
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        dispatch!(self.pool, |conn| {
            sqlx::query("UPDATE categories SET name = ?, slug = ?, description = ? WHERE id = ?")
                .bind(&category.name)
                .bind(&category.slug)
                .bind(&category.description)
                .bind(category.id)
                .execute(conn)
                .await
                .context("Failed to update category")?;
        });
        Ok(category.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = dispatch!(self.pool, |conn| {
            sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete category")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
        dispatch!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get category by id")?;
            match row {
                Some(row) => Ok(Some(category_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE slug = ?", CATEGORY_COLUMNS);
        dispatch!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(conn)
                .await
                .context("Failed to get category by slug")?;
            match row {
                Some(row) => Ok(Some(category_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, limit: Option<i64>) -> Result<Vec<Category>> {
        let mut sql = format!("SELECT {} FROM categories ORDER BY name, id", CATEGORY_COLUMNS);
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }
        dispatch!(self.pool, |conn| {
            let mut query = sqlx::query(&sql);
            if let Some(limit) = limit {
                query = query.bind(limit);
            }
            let rows = query
                .fetch_all(conn)
                .await
                .context("Failed to list categories")?;
            let mut categories = Vec::with_capacity(rows.len());
            for row in rows {
                categories.push(category_from_row!(row));
            }
            Ok(categories)
        })
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        self.exists_where("slug", slug, exclude_id).await
    }

    async fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> Result<bool> {
        self.exists_where("name", name, exclude_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    fn category(name: &str, slug: &str) -> Category {
        Category::new(name.to_string(), slug.to_string(), None)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup_test_repo().await;
        let mut input = category("Rust", "rust");
        input.description = Some("Systems programming".to_string());

        let created = repo.create(&input).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_slug("rust").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.description.as_deref(), Some("Systems programming"));
        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_name_and_limits() {
        let repo = setup_test_repo().await;
        for (name, slug) in [("Zig", "zig"), ("Ada", "ada"), ("Go", "go")] {
            repo.create(&category(name, slug)).await.unwrap();
        }

        let names: Vec<String> = repo
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ada", "Go", "Zig"]);

        assert_eq!(repo.list(Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_uniqueness_checks_exclude_self() {
        let repo = setup_test_repo().await;
        let created = repo.create(&category("Rust", "rust")).await.unwrap();

        assert!(repo.slug_exists("rust", None).await.unwrap());
        assert!(!repo.slug_exists("rust", Some(created.id)).await.unwrap());
        assert!(repo.name_exists("Rust", None).await.unwrap());
        assert!(!repo.name_exists("Go", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&category("Rust", "rust")).await.unwrap();

        created.name = "Rust Lang".to_string();
        repo.update(&created).await.unwrap();
        assert_eq!(
            repo.get_by_id(created.id).await.unwrap().unwrap().name,
            "Rust Lang"
        );

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
