//! Koreo Layout
//!
//! Assigns 2D positions to the visible part of a flat graph. The diagram
//! layer only depends on the [`LayoutEngine`] trait; [`LayeredLayout`] is a
//! left-to-right dagre layout sized for workflow step boxes.

mod layered;

pub use layered::LayeredLayout;

use koreo_graph::{FlatNode, VisibleEdge};
use serde::{Deserialize, Serialize};

/// A node with its top-left corner and size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
  #[serde(flatten)]
  pub node: FlatNode,
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

/// Pure function from nodes and edges to positioned nodes.
pub trait LayoutEngine: Send + Sync {
  fn layout(&self, nodes: &[FlatNode], edges: &[VisibleEdge]) -> Vec<PositionedNode>;
}
