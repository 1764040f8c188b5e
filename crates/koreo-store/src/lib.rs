//! Koreo Store
//!
//! This crate persists the per-graph diagram state: which nodes the user
//! collapsed and whether they prefer the graph or the list view. Everything
//! is stored as plain string-keyed entries.
//!
//! The [`KeyValueStore`] trait defines the storage backend:
//! - [`MemoryStore`] for tests and short-lived sessions
//! - [`FsStore`] for one file per key under a directory
//!
//! [`CollapseStore`] and the view helpers give those entries meaning.

mod collapse;
mod fs;
mod memory;
mod view;

pub use collapse::CollapseStore;
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use view::{VIEW_KEY, ViewMode, load_view, save_view};

use std::sync::Arc;

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// Reading or writing the backing files failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A value could not be encoded.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// String-keyed storage for diagram state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  /// Get the value stored under a key.
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

  /// Store a value, replacing any previous one.
  async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

  /// Remove a key. Removing a missing key is not an error.
  async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    (**self).get(key).await
  }

  async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    (**self).set(key, value).await
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    (**self).remove(key).await
  }
}
