//! Redis cache store
//!
//! Flat keys use `SET`/`SET EX`/`GET`/`DEL`; hashes use `HSET`/`HGET`.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info};

use super::{CacheError, CacheStore, compose_key};

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

/// Redis implementation of [`CacheStore`]
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis (e.g. `redis://localhost:6379`)
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis cache");
        Ok(Self { conn })
    }

    /// Share the underlying connection (the lock provider reuses it)
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str, field: &str) -> Result<String, CacheError> {
        let composed = compose_key(key, field);
        let mut conn = self.conn.clone();

        let value: Option<String> = conn.get(&composed).await?;
        value.ok_or(CacheError::NotFound(composed))
    }

    async fn set(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let composed = compose_key(key, field);
        let mut conn = self.conn.clone();

        if ttl.is_zero() {
            let _: () = conn.set(&composed, value).await?;
        } else {
            // SET EX has second granularity
            let secs = ttl.as_secs().max(1);
            let _: () = conn.set_ex(&composed, value, secs).await?;
        }

        debug!(key = %composed, ttl_secs = ttl.as_secs(), "Cache value written");
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<String, CacheError> {
        let mut conn = self.conn.clone();

        let value: Option<String> = conn.hget(key, field).await?;
        value.ok_or_else(|| CacheError::NotFound(format!("{}#{}", key, field)))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str, field: &str) -> Result<(), CacheError> {
        let composed = compose_key(key, field);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&composed).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_set_get_delete() {
        let cache = RedisCache::connect(TEST_REDIS_URL).await.unwrap();

        cache
            .set("kezbek_test", "k", "v", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(cache.get("kezbek_test", "k").await.unwrap(), "v");

        cache.delete("kezbek_test", "k").await.unwrap();
        assert!(cache.get("kezbek_test", "k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_hash() {
        let cache = RedisCache::connect(TEST_REDIS_URL).await.unwrap();

        cache.hset("kezbek_test_hash", "f", "1").await.unwrap();
        assert_eq!(cache.hget("kezbek_test_hash", "f").await.unwrap(), "1");
    }
}
