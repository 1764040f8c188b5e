use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{KeyValueStore, StoreError};

/// Shapes a stored collapse set may take. New entries are always written
/// as a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedCollapse {
  Ids(Vec<String>),
  Versioned {
    #[serde(rename = "version")]
    _version: u32,
    nodes: Vec<String>,
  },
}

impl PersistedCollapse {
  fn into_set(self) -> BTreeSet<String> {
    match self {
      PersistedCollapse::Ids(ids) => ids.into_iter().collect(),
      PersistedCollapse::Versioned { nodes, .. } => nodes.into_iter().collect(),
    }
  }
}

/// The user's collapsed node ids, one set per diagram state key.
#[derive(Debug, Clone)]
pub struct CollapseStore<S> {
  store: S,
}

impl<S: KeyValueStore> CollapseStore<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Storage key for a diagram's collapse set.
  pub fn key(state_key: &str) -> String {
    format!("{}:collapsedNodes", state_key)
  }

  /// Read the stored set.
  ///
  /// Returns `None` when nothing is stored. An entry that cannot be decoded
  /// is logged and treated as absent.
  pub async fn get(&self, state_key: &str) -> Result<Option<BTreeSet<String>>, StoreError> {
    let key = Self::key(state_key);
    let Some(raw) = self.store.get(&key).await? else {
      return Ok(None);
    };

    match serde_json::from_str::<PersistedCollapse>(&raw) {
      Ok(persisted) => Ok(Some(persisted.into_set())),
      Err(e) => {
        warn!(key = %key, error = %e, "ignoring undecodable collapse state");
        Ok(None)
      }
    }
  }

  /// Load the set, seeding it from `defaults` the first time a diagram is
  /// seen. The seed is written back so later loads return the user's
  /// state even when it becomes empty.
  pub async fn load(
    &self,
    state_key: &str,
    defaults: &BTreeSet<String>,
  ) -> Result<BTreeSet<String>, StoreError> {
    if let Some(stored) = self.get(state_key).await? {
      return Ok(stored);
    }

    debug!(state_key = %state_key, seeded = defaults.len(), "seeding collapse state");
    self.save(state_key, defaults).await?;
    Ok(defaults.clone())
  }

  pub async fn save(&self, state_key: &str, ids: &BTreeSet<String>) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(ids)?;
    self.store.set(&Self::key(state_key), &encoded).await
  }

  /// Forget the stored set. The next [`load`](Self::load) seeds again.
  pub async fn reset(&self, state_key: &str) -> Result<(), StoreError> {
    self.store.remove(&Self::key(state_key)).await
  }
}
