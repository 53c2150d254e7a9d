//! Rate limiter for contact submissions
//!
//! Counts stored submissions rather than keeping in-process state, so the
//! limit survives restarts and is shared by every server process using the
//! same database. Submissions without a known client address share a single
//! bucket.

use crate::config::ContactConfig;
use crate::db::repositories::ContactRepository;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Contact submission rate limiter (5 per 60 minutes by default)
pub struct ContactRateLimiter {
    repo: Arc<dyn ContactRepository>,
    max_submissions: u32,
    window: Duration,
}

impl ContactRateLimiter {
    pub fn new(repo: Arc<dyn ContactRepository>, max_submissions: u32, window: Duration) -> Self {
        Self {
            repo,
            max_submissions,
            window,
        }
    }

    pub fn from_config(repo: Arc<dyn ContactRepository>, config: &ContactConfig) -> Self {
        Self::new(
            repo,
            config.max_submissions,
            Duration::minutes(config.window_minutes),
        )
    }

    /// Check if `ip` already used up its submissions for the current window
    pub async fn is_limited(&self, ip: Option<&str>) -> Result<bool> {
        let since = Utc::now() - self.window;
        let recent = self.repo.count_recent_by_ip(ip, since).await?;
        Ok(recent >= i64::from(self.max_submissions))
    }
}
