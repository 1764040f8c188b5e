//! Which part of a flat graph gets drawn.
//!
//! Two stages, recomputed from scratch on every change:
//! 1. collapse filtering hides every descendant of every collapsed node;
//! 2. path isolation keeps only the chain through a selected edge.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::flat::{FlatEdge, FlatGraph, FlatNode};
use crate::graph::Graph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleEdge {
  #[serde(flatten)]
  pub edge: FlatEdge,
  /// On the isolated path of the selected edge.
  pub highlighted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisibleGraph {
  pub nodes: Vec<FlatNode>,
  pub edges: Vec<VisibleEdge>,
}

impl VisibleGraph {
  pub fn node_ids(&self) -> Vec<&str> {
    self.nodes.iter().map(|n| n.id.as_str()).collect()
  }

  pub fn edge_ids(&self) -> Vec<&str> {
    self.edges.iter().map(|e| e.edge.id.as_str()).collect()
  }
}

/// Union of the descendants of every collapsed id.
///
/// Ids that are not in the graph, or have no outgoing edges, hide nothing.
pub fn hidden_nodes(graph: &Graph, collapsed: &BTreeSet<String>) -> HashSet<String> {
  let mut hidden = HashSet::new();
  for collapsed_id in collapsed {
    hidden.extend(graph.descendants(collapsed_id));
  }
  hidden
}

/// Filter a flat graph down to what should be drawn.
///
/// `selected_edge` is an edge id (`<source>:<target>`). A selection that no
/// longer exists in the graph is ignored.
pub fn compute_visible(
  flat: &FlatGraph,
  collapsed: &BTreeSet<String>,
  selected_edge: Option<&str>,
) -> VisibleGraph {
  let graph = flat.graph();

  let hidden = hidden_nodes(&graph, collapsed);
  let nodes: Vec<&FlatNode> = flat.nodes().filter(|n| !hidden.contains(&n.id)).collect();
  let edges: Vec<&FlatEdge> = flat
    .edges()
    .filter(|e| !hidden.contains(&e.source) && !hidden.contains(&e.target))
    .collect();

  let Some(selected) = selected_edge.and_then(|id| flat.edge(id)) else {
    return VisibleGraph {
      nodes: nodes.into_iter().cloned().collect(),
      edges: edges
        .into_iter()
        .map(|edge| VisibleEdge {
          edge: edge.clone(),
          highlighted: false,
        })
        .collect(),
    };
  };

  // Walk the unfiltered graph so the path ignores collapse state.
  let upstream = graph.upstream_reach(&selected.source);
  let downstream = graph.downstream_reach(&selected.target);

  let mut path_nodes: HashSet<&str> = HashSet::new();
  path_nodes.insert(&selected.source);
  path_nodes.insert(&selected.target);
  path_nodes.extend(upstream.nodes.iter().map(String::as_str));
  path_nodes.extend(downstream.nodes.iter().map(String::as_str));

  let mut path_edges: HashSet<&str> = HashSet::new();
  path_edges.insert(&selected.id);
  path_edges.extend(upstream.edges.iter().map(String::as_str));
  path_edges.extend(downstream.edges.iter().map(String::as_str));

  VisibleGraph {
    nodes: nodes
      .into_iter()
      .filter(|n| path_nodes.contains(n.id.as_str()))
      .cloned()
      .collect(),
    edges: edges
      .into_iter()
      .filter(|e| path_edges.contains(e.id.as_str()))
      .map(|edge| VisibleEdge {
        edge: edge.clone(),
        highlighted: true,
      })
      .collect(),
  }
}
