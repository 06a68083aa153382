use crate::storage::{KeyValueStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local storage; the session lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(keys.iter().filter_map(|&key| entries.get(key).map(|value| (key.to_string(), value.clone()))).collect())
    }

    async fn set_many(&self, values: &[(&str, String)]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        for (key, value) in values {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    async fn remove_if(&self, guard_key: &str, expected: Option<&str>, keys: &[&str]) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        if entries.get(guard_key).map(String::as_str) != expected {
            return Ok(false);
        }
        for key in keys {
            entries.remove(*key);
        }
        Ok(true)
    }
}
