//! In-process cache store
//!
//! Used for local development and tests. Expiry is checked lazily on read.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{CacheError, CacheStore, compose_key};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// DashMap-backed [`CacheStore`]
#[derive(Debug, Default)]
pub struct MemoryCache {
    values: DashMap<String, Entry>,
    hashes: DashMap<String, HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live flat keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.values.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str, field: &str) -> Result<String, CacheError> {
        let composed = compose_key(key, field);
        let now = Instant::now();

        let expired = match self.values.get(&composed) {
            Some(entry) if !entry.is_expired(now) => return Ok(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.values.remove_if(&composed, |_, e| e.is_expired(now));
        }
        Err(CacheError::NotFound(composed))
    }

    async fn set(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };

        self.values.insert(
            compose_key(key, field),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<String, CacheError> {
        self.hashes
            .get(key)
            .and_then(|h| h.get(field).cloned())
            .ok_or_else(|| CacheError::NotFound(format!("{}#{}", key, field)))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str, field: &str) -> Result<(), CacheError> {
        self.values.remove(&compose_key(key, field));
        Ok(())
    }
}
