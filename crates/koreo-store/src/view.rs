use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{KeyValueStore, StoreError};

/// Storage key of the global view preference.
pub const VIEW_KEY: &str = "view";

/// How a workflow is presented: as a diagram or as a plain list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  #[default]
  Graph,
  List,
}

impl ViewMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      ViewMode::Graph => "graph",
      ViewMode::List => "list",
    }
  }
}

impl fmt::Display for ViewMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ViewMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "graph" => Ok(ViewMode::Graph),
      "list" => Ok(ViewMode::List),
      other => Err(format!("unknown view mode: {}", other)),
    }
  }
}

/// Read the view preference. Missing or unknown values mean [`ViewMode::Graph`].
pub async fn load_view<S: KeyValueStore + ?Sized>(store: &S) -> Result<ViewMode, StoreError> {
  let Some(raw) = store.get(VIEW_KEY).await? else {
    return Ok(ViewMode::default());
  };

  match raw.trim().parse() {
    Ok(mode) => Ok(mode),
    Err(e) => {
      warn!(value = %raw, error = %e, "ignoring stored view preference");
      Ok(ViewMode::default())
    }
  }
}

pub async fn save_view<S: KeyValueStore + ?Sized>(
  store: &S,
  mode: ViewMode,
) -> Result<(), StoreError> {
  store.set(VIEW_KEY, mode.as_str()).await
}
