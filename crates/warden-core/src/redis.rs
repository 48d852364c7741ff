//! Redis-backed cache store for distributed deployments.
//!
//! Lets several engine instances share one permission cache, so an
//! invalidation on one instance is seen by all of them.

use crate::cache::{CacheError, CacheStore};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::time::Duration;

/// Redis [`CacheStore`].
///
/// Entries are written with `SET .. EX` so Redis expires them on its own.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use warden_core::{AccessEngine, MemoryRepository, RedisCacheStore};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let store = RedisCacheStore::new("redis://localhost:6379").await?;
///     let engine = AccessEngine::builder(Arc::new(MemoryRepository::new()))
///         .with_cache_store(Arc::new(store))
///         .build()?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: MultiplexedConnection,
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore").finish_non_exhaustive()
    }
}

impl RedisCacheStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., `redis://localhost:6379`)
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(|e| CacheError(e.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_a_cache_error() {
        let result = RedisCacheStore::new("not-a-url").await;
        assert!(result.is_err());
    }
}
