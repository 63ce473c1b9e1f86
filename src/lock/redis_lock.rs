//! Redis lock provider
//!
//! Single-instance Redis lock: `SET name token NX PX expiry` to acquire, a
//! compare-and-delete script to release. The expiry bounds how long a
//! crashed holder can block other replicas.

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{DistributedMutex, LockError, LockProvider};

const UNLOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

impl From<redis::RedisError> for LockError {
    fn from(e: redis::RedisError) -> Self {
        LockError::Backend(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock lifetime in milliseconds
    pub expiry_ms: u64,
    /// Acquisition attempts before giving up
    pub tries: u32,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            expiry_ms: 60_000,
            tries: 3,
            retry_delay_ms: 200,
        }
    }
}

#[derive(Clone)]
pub struct RedisLockProvider {
    conn: ConnectionManager,
    config: LockConfig,
}

impl RedisLockProvider {
    pub fn new(conn: ConnectionManager, config: LockConfig) -> Self {
        Self { conn, config }
    }
}

impl LockProvider for RedisLockProvider {
    fn new_mutex(&self, name: &str) -> Box<dyn DistributedMutex> {
        Box::new(RedisMutex {
            conn: self.conn.clone(),
            name: name.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            config: self.config.clone(),
        })
    }
}

struct RedisMutex {
    conn: ConnectionManager,
    name: String,
    token: String,
    config: LockConfig,
}

#[async_trait]
impl DistributedMutex for RedisMutex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lock(&mut self) -> Result<(), LockError> {
        let tries = self.config.tries.max(1);

        for attempt in 1..=tries {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&self.name)
                .arg(&self.token)
                .arg("NX")
                .arg("PX")
                .arg(self.config.expiry_ms)
                .query_async(&mut self.conn)
                .await?;

            if acquired.is_some() {
                debug!(lock = %self.name, attempt, "Lock acquired");
                return Ok(());
            }

            if attempt < tries {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }

        Err(LockError::Held(self.name.clone()))
    }

    async fn unlock(&mut self) -> Result<bool, LockError> {
        let released: i64 = Script::new(UNLOCK_SCRIPT)
            .key(&self.name)
            .arg(&self.token)
            .invoke_async(&mut self.conn)
            .await?;

        debug!(lock = %self.name, released = released == 1, "Lock release attempted");
        Ok(released == 1)
    }
}
