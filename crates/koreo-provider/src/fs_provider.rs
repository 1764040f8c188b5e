use std::path::{Path, PathBuf};

use async_trait::async_trait;
use koreo_source::SourceGraph;
use tokio::fs;
use tracing::debug;

use crate::{GraphProvider, GraphTarget, ProviderError};

/// Serves graphs from a directory tree:
/// ```text
/// {root}/
/// └── default/
///     └── order-workflow/
///         ├── graph.json
///         └── instances/
///             └── order-abc.json
/// ```
#[derive(Debug, Clone)]
pub struct FsGraphProvider {
  root: PathBuf,
}

impl FsGraphProvider {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// File holding the graph for a target.
  pub fn path_for(&self, target: &GraphTarget) -> Result<PathBuf, ProviderError> {
    let dir = self
      .root
      .join(path_component(&target.namespace)?)
      .join(path_component(&target.workflow_id)?);

    Ok(match &target.instance_id {
      Some(instance) => dir
        .join("instances")
        .join(format!("{}.json", path_component(instance)?)),
      None => dir.join("graph.json"),
    })
  }
}

/// Reject names that would escape their directory.
fn path_component(name: &str) -> Result<&str, ProviderError> {
  if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
    return Err(ProviderError::InvalidTarget(name.to_string()));
  }
  Ok(name)
}

#[async_trait]
impl GraphProvider for FsGraphProvider {
  async fn fetch(&self, target: &GraphTarget) -> Result<SourceGraph, ProviderError> {
    let path = self.path_for(target)?;

    let content = match fs::read_to_string(&path).await {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(ProviderError::NotFound(target.clone()));
      }
      Err(e) => return Err(e.into()),
    };

    let graph: SourceGraph = serde_json::from_str(&content)?;
    debug!(
      target = %target,
      path = %path.display(),
      nodes = graph.nodes.len(),
      edges = graph.edges.len(),
      "read source graph"
    );
    Ok(graph)
  }
}
