//! Tag model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A free-form label. Pages and tags are linked through `page_tags`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// Unique URL-safe slug
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// The ID is assigned by the database on insert.
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: 0,
            name,
            slug,
            created_at: Utc::now(),
        }
    }
}

/// Tag fields accepted by the moderation API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}
