//! Key/value cache seam
//!
//! The pricing index, the reward schedule and the LinkSaja bearer token all
//! live in a shared key/value store. Keys are composed as
//! `"{namespace}:{field}"`; `hget`/`hset` address a hash named `key`.
//!
//! Writers replace whole values (delete-then-set), so readers only ever see
//! an old or a new complete snapshot. Warm jobs record the fields they wrote
//! under [`INDEX_FIELD`] so the next warm can drop fields that disappeared
//! from the source.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryCache;
pub use redis_store::RedisCache;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Field holding the fields written by the last warm of a namespace
///
/// Lower-case, so it never collides with the upper-cased wallet codes and
/// schedule fields.
pub const INDEX_FIELD: &str = "__fields";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache key not found: {0}")]
    NotFound(String),

    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache value codec error: {0}")]
    Codec(String),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

/// Compose a flat cache key
pub fn compose_key(namespace: &str, field: &str) -> String {
    format!("{}:{}", namespace, field)
}

/// Cache store used by the core
///
/// A `ttl` of [`Duration::ZERO`] means the value never expires.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str, field: &str) -> Result<String, CacheError>;

    async fn set(&self, key: &str, field: &str, value: &str, ttl: Duration)
    -> Result<(), CacheError>;

    async fn hget(&self, key: &str, field: &str) -> Result<String, CacheError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError>;

    async fn delete(&self, key: &str, field: &str) -> Result<(), CacheError>;
}

/// Read and decode a JSON value
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheStore,
    key: &str,
    field: &str,
) -> Result<T, CacheError> {
    let raw = cache.get(key, field).await?;
    serde_json::from_str(&raw).map_err(|e| CacheError::Codec(e.to_string()))
}

/// Replace a JSON value (delete-then-set)
pub async fn replace_json<T: Serialize + ?Sized>(
    cache: &dyn CacheStore,
    key: &str,
    field: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value).map_err(|e| CacheError::Codec(e.to_string()))?;
    cache.delete(key, field).await?;
    cache.set(key, field, &raw, ttl).await
}

/// Delete fields written by the previous warm that are missing from
/// `current`, then record `current` as the namespace index
///
/// Returns the number of fields deleted. A missing or unreadable index
/// counts as empty.
pub async fn prune_snapshot(
    cache: &dyn CacheStore,
    namespace: &str,
    current: &BTreeSet<String>,
) -> Result<usize, CacheError> {
    let previous: Vec<String> = match get_json(cache, namespace, INDEX_FIELD).await {
        Ok(fields) => fields,
        Err(CacheError::NotFound(_)) => Vec::new(),
        Err(CacheError::Codec(e)) => {
            warn!(namespace, error = %e, "Unreadable cache index, rebuilding");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for field in previous.iter().filter(|f| !current.contains(f.as_str())) {
        cache.delete(namespace, field).await?;
        removed += 1;
    }

    replace_json(cache, namespace, INDEX_FIELD, current, Duration::ZERO).await?;
    Ok(removed)
}
