//! Cache layer
//!
//! Process-local cache (moka) for rendered navigation context. Values are
//! stored as JSON, so any serializable type can be cached.
//!
//! ```rust,ignore
//! let cache = create_cache(&config.cache)?;
//! cache.set("sidebar", &sidebar, Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The methods are generic, so the trait is not object safe; services hold
/// the concrete [`Cache`] type.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store a value that expires after `ttl`
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob pattern (`*` and `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// The cache shared by services
pub type Cache = MemoryCache;

/// Build the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    let cache = MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl);
    tracing::debug!(
        "Memory cache ready (capacity {}, ttl {:?})",
        config.max_capacity,
        ttl
    );
    Ok(Arc::new(cache))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_config() {
        let config = CacheConfig {
            ttl_seconds: 30,
            max_capacity: 10,
        };
        let cache = create_cache(&config).unwrap();
        assert_eq!(cache.default_ttl(), Duration::from_secs(30));

        cache.set("k", &42u32, cache.default_ttl()).await.unwrap();
        assert_eq!(cache.get::<u32>("k").await.unwrap(), Some(42));
    }
}
