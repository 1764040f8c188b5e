use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{KeyValueStore, StoreError};

/// File-backed store.
///
/// Each key lives in its own file under the root directory:
/// ```text
/// <root>/
///   view
///   workflow%3Adefault%3Aorder%3Ainstance%3Anull%3AcollapsedNodes
/// ```
///
/// Keys are escaped so any key maps to a single portable file name.
#[derive(Debug, Clone)]
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  /// Create a store rooted at `root`. The directory is created on first write.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.root.join(escape_key(key))
  }
}

/// Percent-escape everything outside `[A-Za-z0-9_-]`.
fn escape_key(key: &str) -> String {
  let mut out = String::with_capacity(key.len());
  for byte in key.bytes() {
    match byte {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
      _ => out.push_str(&format!("%{:02X}", byte)),
    }
  }
  out
}

#[async_trait]
impl KeyValueStore for FsStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(self.path_for(key)).await {
      Ok(value) => Ok(Some(value)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    fs::create_dir_all(&self.root).await?;

    let path = self.path_for(key);
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, value).await?;
    fs::rename(&tmp, &path).await?;

    debug!(key = %key, path = %path.display(), "stored entry");
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    match fs::remove_file(self.path_for(key)).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
