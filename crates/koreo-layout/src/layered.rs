use std::collections::{HashMap, HashSet};

use dagre_rust::{
  GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
  layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};
use koreo_graph::{FlatNode, VisibleEdge};

use crate::{LayoutEngine, PositionedNode};

/// Left-to-right dagre layout with fixed node sizes.
///
/// dagre anchors nodes at their centre; positions are shifted to the
/// top-left corner before they are returned.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredLayout {
  pub node_width: f32,
  pub node_height: f32,
  /// Gap between ranks.
  pub rank_sep: f32,
  /// Gap between nodes of the same rank.
  pub node_sep: f32,
}

impl Default for LayeredLayout {
  fn default() -> Self {
    Self {
      node_width: 175.0,
      node_height: 36.0,
      rank_sep: 60.0,
      node_sep: 20.0,
    }
  }
}

impl LayeredLayout {
  fn graph(&self) -> DagreGraph<DagreConfig, DagreNode, DagreEdge> {
    let mut graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
      DagreGraph::new(Some(GraphOption {
        directed: Some(true),
        multigraph: Some(false),
        compound: Some(false),
      }));

    let mut config = DagreConfig::default();
    config.rankdir = Some("lr".to_string());
    config.ranksep = Some(self.rank_sep);
    config.nodesep = Some(self.node_sep);
    graph.set_graph(config);
    graph
  }

  fn positioned(&self, node: &FlatNode, center: Option<(f32, f32)>) -> PositionedNode {
    let (x, y) = match center {
      Some((cx, cy)) => (cx - self.node_width / 2.0, cy - self.node_height / 2.0),
      None => (0.0, 0.0),
    };

    PositionedNode {
      node: node.clone(),
      x: f64::from(x),
      y: f64::from(y),
      width: f64::from(self.node_width),
      height: f64::from(self.node_height),
    }
  }
}

impl LayoutEngine for LayeredLayout {
  fn layout(&self, nodes: &[FlatNode], edges: &[VisibleEdge]) -> Vec<PositionedNode> {
    if nodes.is_empty() {
      return Vec::new();
    }

    let mut graph = self.graph();
    for node in nodes {
      let mut label = DagreNode::default();
      label.width = self.node_width;
      label.height = self.node_height;
      graph.set_node(node.id.clone(), Some(label));
    }

    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for visible in edges {
      let (source, target) = (visible.edge.source.as_str(), visible.edge.target.as_str());
      if source == target || !known.contains(source) || !known.contains(target) {
        continue;
      }
      if !seen.insert((source, target)) {
        continue;
      }
      let _ = graph.set_edge(
        &source.to_string(),
        &target.to_string(),
        Some(DagreEdge::default()),
        None,
      );
    }

    dagre_layout::run_layout(&mut graph);

    let centers: HashMap<&str, (f32, f32)> = nodes
      .iter()
      .filter_map(|n| graph.node(&n.id).map(|placed| (n.id.as_str(), (placed.x, placed.y))))
      .collect();

    nodes
      .iter()
      .map(|node| self.positioned(node, centers.get(node.id.as_str()).copied()))
      .collect()
  }
}
