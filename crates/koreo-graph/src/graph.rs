use std::collections::{HashMap, HashSet};

use crate::flat::edge_id;

/// Everything reached by a transitive walk, plus the edges walked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reach {
  pub nodes: HashSet<String>,
  pub edges: HashSet<String>,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
  Downstream,
  Upstream,
}

/// Adjacency index for traversal and analysis.
///
/// Cheap to build; rebuild it from the current edge list whenever the edges
/// change instead of patching it.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from node ids and (source, target) pairs.
  ///
  /// Edges may name ids that are not in `node_ids`; they are still walked.
  pub fn new<'a>(
    node_ids: impl IntoIterator<Item = &'a str>,
    edges: impl IntoIterator<Item = (&'a str, &'a str)>,
  ) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node_id in node_ids {
      adjacency.entry(node_id.to_string()).or_default();
      reverse_adjacency.entry(node_id.to_string()).or_default();
    }

    for (from, to) in edges {
      adjacency
        .entry(from.to_string())
        .or_default()
        .push(to.to_string());
      reverse_adjacency
        .entry(to.to_string())
        .or_default()
        .push(from.to_string());
    }

    Self {
      adjacency,
      reverse_adjacency,
    }
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Whether collapsing this node would hide anything.
  pub fn has_outgoing(&self, node_id: &str) -> bool {
    !self.downstream(node_id).is_empty()
  }

  /// All nodes reachable by following outgoing edges, excluding the start
  /// unless a cycle leads back to it.
  pub fn descendants(&self, node_id: &str) -> HashSet<String> {
    self.walk(node_id, Direction::Downstream).nodes
  }

  /// Downstream closure including the edges that were followed.
  pub fn downstream_reach(&self, node_id: &str) -> Reach {
    self.walk(node_id, Direction::Downstream)
  }

  /// Upstream closure including the edges that were followed.
  pub fn upstream_reach(&self, node_id: &str) -> Reach {
    self.walk(node_id, Direction::Upstream)
  }

  /// Iterative DFS. The visited set keeps cyclic input from looping.
  fn walk(&self, start: &str, direction: Direction) -> Reach {
    let mut reach = Reach::default();
    let mut stack = vec![start.to_string()];

    while let Some(current) = stack.pop() {
      let neighbors = match direction {
        Direction::Downstream => self.downstream(&current),
        Direction::Upstream => self.upstream(&current),
      };

      for next in neighbors {
        let id = match direction {
          Direction::Downstream => edge_id(&current, next),
          Direction::Upstream => edge_id(next, &current),
        };
        reach.edges.insert(id);

        if reach.nodes.insert(next.clone()) {
          stack.push(next.clone());
        }
      }
    }

    reach
  }
}
