use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::{KeyValueStore, StoreError};

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    Ok(entries.get(key).cloned())
  }

  async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    entries.remove(key);
    Ok(())
  }
}
