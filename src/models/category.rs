//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A flat grouping of pages. Each page belongs to at most one category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    /// Unique display name
    pub name: String,
    /// Unique URL-safe slug
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// The ID is assigned by the database on insert.
    pub fn new(name: String, slug: String, description: Option<String>) -> Self {
        Self {
            id: 0,
            name,
            slug,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Category fields accepted by the moderation API.
///
/// A missing slug is generated from the name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
