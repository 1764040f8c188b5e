//! Koreo Source
//!
//! This crate contains the serializable source graph types: the workflow
//! graph as it comes back from the backend, before it is flattened for
//! drawing.
//!
//! A source graph can be loaded from:
//! - JSON files (via the CLI's graph directory)
//! - Any other provider that yields the same JSON shape
//!
//! Sub-workflow nodes embed a whole nested [`SourceGraph`], so the structure
//! is a tree of graphs. Nothing here interprets that nesting; see
//! `koreo-graph` for the flattening rules.

mod edge;
mod graph;
mod node;
mod resource;

pub use edge::{EdgeType, SourceEdge};
pub use graph::SourceGraph;
pub use node::{
  GenericNode, NodeMetadata, RefSwitchNode, ResourceFunctionNode, SourceNode, SubWorkflowNode,
};
pub use resource::{KubernetesResource, ManagedResource};
