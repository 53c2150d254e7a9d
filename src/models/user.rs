//! User model
//!
//! Users own pages. They are provisioned from configuration at startup;
//! there is no sign-up or password flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    /// Unique login name
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The ID is assigned by the database on insert.
    pub fn new(username: String, email: String) -> Self {
        Self {
            id: 0,
            username,
            email,
            display_name: None,
            created_at: Utc::now(),
        }
    }

    /// Name shown on page bylines
    pub fn public_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}
