use std::collections::{BTreeMap, BTreeSet};

use koreo_source::KubernetesResource;
use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::status::NodeStatus;

/// Edge identity is a pure function of its endpoints.
pub fn edge_id(source: &str, target: &str) -> String {
  format!("{}:{}", source, target)
}

/// A node ready for layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatNode {
  pub id: String,
  pub label: String,
  pub display_kind: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resource: Option<KubernetesResource>,
  pub status: NodeStatus,
  pub no_background: bool,
  pub default_collapsed: bool,
  /// Set once edges are known: true when the node has outgoing edges.
  pub collapsible: bool,
}

impl FlatNode {
  pub fn new(id: impl Into<String>, label: impl Into<String>, display_kind: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      label: label.into(),
      display_kind: display_kind.into(),
      resource: None,
      status: NodeStatus::None,
      no_background: false,
      default_collapsed: false,
      collapsible: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatEdge {
  pub id: String,
  pub source: String,
  pub target: String,
  pub dashed: bool,
}

impl FlatEdge {
  pub fn new(source: impl Into<String>, target: impl Into<String>, dashed: bool) -> Self {
    let source = source.into();
    let target = target.into();
    Self {
      id: edge_id(&source, &target),
      source,
      target,
      dashed,
    }
  }
}

/// Flattened graph. Nodes and edges are keyed by id, so re-inserting the
/// same id replaces the previous entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "FlatGraphRepr", from = "FlatGraphRepr")]
pub struct FlatGraph {
  nodes: BTreeMap<String, FlatNode>,
  edges: BTreeMap<String, FlatEdge>,
}

impl FlatGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert_node(&mut self, node: FlatNode) {
    self.nodes.insert(node.id.clone(), node);
  }

  pub fn insert_edge(&mut self, edge: FlatEdge) {
    self.edges.insert(edge.id.clone(), edge);
  }

  pub fn node(&self, node_id: &str) -> Option<&FlatNode> {
    self.nodes.get(node_id)
  }

  pub fn node_mut(&mut self, node_id: &str) -> Option<&mut FlatNode> {
    self.nodes.get_mut(node_id)
  }

  pub fn edge(&self, edge_id: &str) -> Option<&FlatEdge> {
    self.edges.get(edge_id)
  }

  pub fn contains_node(&self, node_id: &str) -> bool {
    self.nodes.contains_key(node_id)
  }

  /// Nodes in id order.
  pub fn nodes(&self) -> impl Iterator<Item = &FlatNode> {
    self.nodes.values()
  }

  /// Edges in id order.
  pub fn edges(&self) -> impl Iterator<Item = &FlatEdge> {
    self.edges.values()
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  pub fn edge_count(&self) -> usize {
    self.edges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Move every node and edge of `other` into this graph.
  pub fn merge(&mut self, other: FlatGraph) {
    self.nodes.extend(other.nodes);
    self.edges.extend(other.edges);
  }

  /// Give a node a new id, rewriting every edge that touches it.
  pub fn rename_node(&mut self, from: &str, to: &str) {
    if from == to {
      return;
    }
    self.map_ids(|id| if id == from { to.to_string() } else { id.to_string() });
  }

  /// Rewrite every node id and edge endpoint through `f`.
  pub fn map_ids(&mut self, f: impl Fn(&str) -> String) {
    let nodes = std::mem::take(&mut self.nodes);
    for (_, mut node) in nodes {
      node.id = f(&node.id);
      self.insert_node(node);
    }

    let edges = std::mem::take(&mut self.edges);
    for (_, edge) in edges {
      self.insert_edge(FlatEdge::new(f(&edge.source), f(&edge.target), edge.dashed));
    }
  }

  /// Flag every node that is the source of at least one edge.
  pub fn mark_collapsible(&mut self) {
    let graph = self.graph();
    for node in self.nodes.values_mut() {
      node.collapsible = graph.has_outgoing(&node.id);
    }
  }

  /// Ids of nodes the backend asked to start collapsed.
  pub fn default_collapsed(&self) -> BTreeSet<String> {
    self
      .nodes
      .values()
      .filter(|n| n.default_collapsed)
      .map(|n| n.id.clone())
      .collect()
  }

  /// Build the adjacency index for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(
      self.nodes.keys().map(String::as_str),
      self
        .edges
        .values()
        .map(|e| (e.source.as_str(), e.target.as_str())),
    )
  }
}

#[derive(Serialize, Deserialize)]
struct FlatGraphRepr {
  nodes: Vec<FlatNode>,
  edges: Vec<FlatEdge>,
}

impl From<FlatGraph> for FlatGraphRepr {
  fn from(graph: FlatGraph) -> Self {
    Self {
      nodes: graph.nodes.into_values().collect(),
      edges: graph.edges.into_values().collect(),
    }
  }
}

impl From<FlatGraphRepr> for FlatGraph {
  fn from(repr: FlatGraphRepr) -> Self {
    let mut graph = FlatGraph::new();
    for node in repr.nodes {
      graph.insert_node(node);
    }
    for edge in repr.edges {
      graph.insert_edge(edge);
    }
    graph
  }
}
