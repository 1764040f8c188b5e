use serde::{Deserialize, Serialize};

/// Kind of a source edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
  /// Plain dependency between two steps.
  #[default]
  Default,
  /// From a workflow's parent object into the workflow.
  ParentToWorkflow,
  /// From a step to a resource it manages.
  StepToResource,
}

impl EdgeType {
  /// Whether edges of this kind are drawn dashed.
  pub fn is_dashed(self) -> bool {
    !matches!(self, EdgeType::Default)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEdge {
  pub source: String,
  pub target: String,
  #[serde(rename = "type", default)]
  pub edge_type: EdgeType,
}

impl SourceEdge {
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self::with_type(source, target, EdgeType::Default)
  }

  pub fn with_type(
    source: impl Into<String>,
    target: impl Into<String>,
    edge_type: EdgeType,
  ) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      edge_type,
    }
  }
}
