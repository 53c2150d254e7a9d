//! Contact repository
//!
//! Stores contact submissions and answers the rate limiter's question of how
//! many submissions an address made since a point in time.

use super::{contains_pattern, placeholders};
use crate::db::{DynDatabasePool, InsertedId};
use crate::models::{Contact, ContactFilter, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, contact: &Contact) -> Result<Contact>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Contact>>;

    /// Submissions matching `filter`, newest first
    async fn list(&self, filter: &ContactFilter, params: &ListParams) -> Result<Vec<Contact>>;

    async fn count(&self, filter: &ContactFilter) -> Result<i64>;

    /// Submissions from `ip` created at or after `since`. `None` counts
    /// submissions with no recorded address.
    async fn count_recent_by_ip(&self, ip: Option<&str>, since: DateTime<Utc>) -> Result<i64>;

    /// Set the read flag on the given rows, returning how many matched
    async fn set_read(&self, ids: &[i64], is_read: bool) -> Result<u64>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

const CONTACT_COLUMNS: &str = "id, name, email, subject, message, is_read, created_at, ip_address";

macro_rules! contact_from_row {
    ($row:expr) => {
        Contact {
            id: $row.try_get("id")?,
            name: $row.try_get("name")?,
            email: $row.try_get("email")?,
            subject: $row.try_get("subject")?,
            message: $row.try_get("message")?,
            is_read: $row.try_get("is_read")?,
            created_at: $row.try_get("created_at")?,
            ip_address: $row.try_get("ip_address")?,
        }
    };
}

/// ` WHERE ...` for a moderation filter, the read flag, and the search
/// pattern (bound four times)
fn filter_clause(filter: &ContactFilter) -> (String, Option<bool>, Option<String>) {
    let mut conditions = Vec::new();
    if filter.is_read.is_some() {
        conditions.push("is_read = ?");
    }
    let pattern = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(contains_pattern);
    if pattern.is_some() {
        conditions.push(
            "(LOWER(name) LIKE ? ESCAPE '!' OR LOWER(email) LIKE ? ESCAPE '!' \
              OR LOWER(subject) LIKE ? ESCAPE '!' OR LOWER(message) LIKE ? ESCAPE '!')",
        );
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, filter.is_read, pattern)
}

macro_rules! bind_contact_filter {
    ($query:expr, $is_read:expr, $pattern:expr) => {{
        let mut query = $query;
        if let Some(is_read) = $is_read {
            query = query.bind(is_read);
        }
        if let Some(pattern) = $pattern {
            for _ in 0..4 {
                query = query.bind(pattern.clone());
            }
        }
        query
    }};
}

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn create(&self, contact: &Contact) -> Result<Contact> {
        let id = dispatch!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO contacts (name, email, subject, message, is_read, created_at, ip_address)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&contact.name)
            .bind(&contact.email)
            .bind(&contact.subject)
            .bind(&contact.message)
            .bind(contact.is_read)
            .bind(contact.created_at)
            .bind(&contact.ip_address)
            .execute(conn)
            .await
            .context("Failed to store contact submission")?
            .inserted_id()
        });

        Ok(Contact {
            id,
            ..contact.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Contact>> {
        let sql = format!("SELECT {} FROM contacts WHERE id = ?", CONTACT_COLUMNS);
        dispatch!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get contact by id")?;
            match row {
                Some(row) => Ok(Some(contact_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, filter: &ContactFilter, params: &ListParams) -> Result<Vec<Contact>> {
        let (clause, is_read, pattern) = filter_clause(filter);
        let sql = format!(
            "SELECT {} FROM contacts{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            CONTACT_COLUMNS, clause
        );
        dispatch!(self.pool, |conn| {
            let rows = bind_contact_filter!(sqlx::query(&sql), is_read, &pattern)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list contacts")?;
            let mut contacts = Vec::with_capacity(rows.len());
            for row in rows {
                contacts.push(contact_from_row!(row));
            }
            Ok(contacts)
        })
    }

    async fn count(&self, filter: &ContactFilter) -> Result<i64> {
        let (clause, is_read, pattern) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) AS n FROM contacts{}", clause);
        let count: i64 = dispatch!(self.pool, |conn| {
            bind_contact_filter!(sqlx::query(&sql), is_read, &pattern)
                .fetch_one(conn)
                .await
                .context("Failed to count contacts")?
                .try_get("n")?
        });
        Ok(count)
    }

    async fn count_recent_by_ip(&self, ip: Option<&str>, since: DateTime<Utc>) -> Result<i64> {
        let sql = match ip {
            Some(_) => "SELECT COUNT(*) AS n FROM contacts WHERE ip_address = ? AND created_at >= ?",
            None => "SELECT COUNT(*) AS n FROM contacts WHERE ip_address IS NULL AND created_at >= ?",
        };
        let count: i64 = dispatch!(self.pool, |conn| {
            let mut query = sqlx::query(sql);
            if let Some(ip) = ip {
                query = query.bind(ip);
            }
            query
                .bind(since)
                .fetch_one(conn)
                .await
                .context("Failed to count recent contact submissions")?
                .try_get("n")?
        });
        Ok(count)
    }

    async fn set_read(&self, ids: &[i64], is_read: bool) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        // Every matched row counts, including ones already in the target state
        let sql = format!(
            "UPDATE contacts SET is_read = ? WHERE id IN ({})",
            placeholders(ids.len())
        );
        let affected = dispatch!(self.pool, |conn| {
            let mut query = sqlx::query(&sql).bind(is_read);
            for id in ids {
                query = query.bind(*id);
            }
            query
                .execute(conn)
                .await
                .context("Failed to update contact read state")?
                .rows_affected()
        });
        Ok(affected)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = dispatch!(self.pool, |conn| {
            sqlx::query("DELETE FROM contacts WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete contact")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}
