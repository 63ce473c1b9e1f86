//! In-process lock provider for tests and single-node development

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use super::{DistributedMutex, LockError, LockProvider};

#[derive(Debug, Default, Clone)]
pub struct MemoryLockProvider {
    held: Arc<DashMap<String, String>>,
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held.contains_key(name)
    }
}

impl LockProvider for MemoryLockProvider {
    fn new_mutex(&self, name: &str) -> Box<dyn DistributedMutex> {
        Box::new(MemoryMutex {
            held: self.held.clone(),
            name: name.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
        })
    }
}

struct MemoryMutex {
    held: Arc<DashMap<String, String>>,
    name: String,
    token: String,
}

#[async_trait]
impl DistributedMutex for MemoryMutex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lock(&mut self) -> Result<(), LockError> {
        match self.held.entry(self.name.clone()) {
            Entry::Occupied(_) => Err(LockError::Held(self.name.clone())),
            Entry::Vacant(v) => {
                v.insert(self.token.clone());
                Ok(())
            }
        }
    }

    async fn unlock(&mut self) -> Result<bool, LockError> {
        Ok(self
            .held
            .remove_if(&self.name, |_, owner| *owner == self.token)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_owner_is_rejected() {
        let provider = MemoryLockProvider::new();
        let mut first = provider.new_mutex("sweep");
        let mut second = provider.new_mutex("sweep");

        first.lock().await.unwrap();
        assert!(matches!(second.lock().await, Err(LockError::Held(_))));

        assert!(!second.unlock().await.unwrap());
        assert!(provider.is_held("sweep"));

        assert!(first.unlock().await.unwrap());
        assert!(!provider.is_held("sweep"));

        second.lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_names_are_independent() {
        let provider = MemoryLockProvider::new();
        let mut a = provider.new_mutex("a");
        let mut b = provider.new_mutex("b");

        a.lock().await.unwrap();
        b.lock().await.unwrap();
        assert_eq!(a.name(), "a");
    }
}
