use serde::{Deserialize, Serialize};

use crate::edge::SourceEdge;
use crate::node::SourceNode;
use crate::resource::ManagedResource;

/// A workflow graph as supplied by the backend.
///
/// Node order matters: the first node is the workflow's entry, which is
/// what a sub-workflow is represented by when it is not expanded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceGraph {
  #[serde(default)]
  pub nodes: Vec<SourceNode>,
  #[serde(default)]
  pub edges: Vec<SourceEdge>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub managed_resources: Vec<ManagedResource>,
}

impl SourceGraph {
  /// The entry node, if any.
  pub fn first_node(&self) -> Option<&SourceNode> {
    self.nodes.first()
  }

  /// A sub-workflow whose graph came back empty could not be resolved.
  pub fn is_resolved(&self) -> bool {
    !self.nodes.is_empty()
  }

  /// Get a top-level node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&SourceNode> {
    self.nodes.iter().find(|n| n.id() == node_id)
  }
}
