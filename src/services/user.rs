//! User service
//!
//! There is no sign-up: the site owner is provisioned from `admin.*`
//! configuration at startup and becomes the author of pages saved through
//! the moderation API.

use crate::db::repositories::UserRepository;
use crate::models::User;
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Fetch `username`, creating it with `email` the first time.
    ///
    /// An existing user keeps its stored email.
    pub async fn ensure_user(&self, username: &str, email: &str) -> Result<User> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to look up user")?
        {
            return Ok(user);
        }

        let user = self
            .user_repo
            .create(&User::new(username.to_string(), email.to_string()))
            .await
            .context("Failed to create user")?;
        tracing::info!("Created user '{}'", user.username);
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        self.user_repo.get_by_id(id).await
    }
}
