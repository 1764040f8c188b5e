//! Koreo Graph
//!
//! Turns a backend [`SourceGraph`](koreo_source::SourceGraph) into a flat
//! node/edge set that can be laid out and drawn, and decides which parts of
//! that flat graph are visible given the user's collapse and selection state.
//!
//! Key pieces:
//! - [`flatten`] / [`flatten_with`]: recursive rewrite of switches and
//!   sub-workflows, collapsed or expanded
//! - [`Graph`]: adjacency index rebuilt per pass for reachability
//! - [`compute_visible`]: collapse filtering, then path isolation
//!
//! Everything here is synchronous and pure. Callers are expected to rerun
//! it from scratch on every state change.

mod error;
mod flat;
mod flatten;
mod graph;
mod status;
mod visibility;

pub use error::FlattenError;
pub use flat::{FlatEdge, FlatGraph, FlatNode, edge_id};
pub use flatten::{FlattenOptions, MAX_NESTING_DEPTH, flatten, flatten_with};
pub use graph::{Graph, Reach};
pub use status::NodeStatus;
pub use visibility::{VisibleEdge, VisibleGraph, compute_visible, hidden_nodes};
