//! Distributed Mutex
//!
//! Cluster-wide mutual exclusion for scheduled jobs. Only the tier expiry
//! sweep uses it: every scheduler replica ticks, one of them wins the lock,
//! the rest log and skip that tick.

pub mod memory;
pub mod redis_lock;

pub use memory::MemoryLockProvider;
pub use redis_lock::RedisLockProvider;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock {0} is held by another owner")]
    Held(String),

    #[error("Lock backend error: {0}")]
    Backend(String),
}

/// A named mutex shared across processes
#[async_trait]
pub trait DistributedMutex: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire the mutex or fail; no waiting beyond the provider's own retries
    async fn lock(&mut self) -> Result<(), LockError>;

    /// Release the mutex. `Ok(false)` means it was no longer ours
    /// (expired or taken over) when we tried to release it.
    async fn unlock(&mut self) -> Result<bool, LockError>;
}

/// Factory for named mutexes
pub trait LockProvider: Send + Sync {
    fn new_mutex(&self, name: &str) -> Box<dyn DistributedMutex>;
}
