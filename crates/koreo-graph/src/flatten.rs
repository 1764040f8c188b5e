//! Source graph -> flat graph.
//!
//! Each source node is emitted as one or more flat nodes and described by
//! its [`Ports`]: the id incoming edges should land on and the ids outgoing
//! edges should leave from. Edges are emitted last, once every node's ports
//! are known, so a switch or sub-workflow can be referenced from anywhere in
//! its level.

use std::collections::{HashMap, HashSet};

use koreo_source::{
  EdgeType, KubernetesResource, ManagedResource, RefSwitchNode, SourceGraph, SourceNode,
  SubWorkflowNode,
};
use tracing::{debug, trace};

use crate::error::FlattenError;
use crate::flat::{FlatEdge, FlatGraph, FlatNode};
use crate::status::NodeStatus;

/// Deepest sub-workflow / switch nesting that will be flattened.
pub const MAX_NESTING_DEPTH: usize = 32;

const SUB_WORKFLOW_KIND: &str = "Sub-Workflow";
const REF_SWITCH_KIND: &str = "RefSwitch";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenOptions {
  /// Inline switch branches and sub-workflow internals.
  pub expanded: bool,
  /// Draw each managed resource as its own leaf node.
  pub include_managed_resources: bool,
  /// The graph carries live resource state; a step without a resource has
  /// not produced it yet.
  pub instance: bool,
}

/// Flatten a definition graph.
pub fn flatten(
  graph: &SourceGraph,
  expanded: bool,
  include_managed_resources: bool,
) -> Result<FlatGraph, FlattenError> {
  flatten_with(
    graph,
    &FlattenOptions {
      expanded,
      include_managed_resources,
      instance: false,
    },
  )
}

pub fn flatten_with(
  graph: &SourceGraph,
  options: &FlattenOptions,
) -> Result<FlatGraph, FlattenError> {
  let flattener = Flattener { options: *options };
  let mut level = flattener.flatten_level(graph, 0, options.include_managed_resources)?;
  level.graph.mark_collapsible();

  debug!(
    nodes = level.graph.node_count(),
    edges = level.graph.edge_count(),
    expanded = options.expanded,
    "flattened workflow graph"
  );

  Ok(level.graph)
}

/// Where edges attach to whatever a source node became.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ports {
  entry: String,
  exits: Vec<String>,
}

impl Ports {
  fn single(id: impl Into<String>) -> Self {
    let id = id.into();
    Self {
      entry: id.clone(),
      exits: vec![id],
    }
  }

  fn map_ids(&mut self, f: &impl Fn(&str) -> String) {
    self.entry = f(&self.entry);
    for exit in &mut self.exits {
      *exit = f(exit);
    }
  }
}

/// One flattened graph level.
struct Level {
  graph: FlatGraph,
  ports: HashMap<String, Ports>,
  /// Sub-workflows that came back empty; edges touching them are dropped.
  unresolved: HashSet<String>,
  /// First resolved node in source order.
  first: Option<String>,
}

impl Level {
  fn first_ports(&self) -> Option<&Ports> {
    self.first.as_ref().and_then(|id| self.ports.get(id))
  }

  fn exits_of(&self, leaf_ids: &[String]) -> Vec<String> {
    leaf_ids
      .iter()
      .filter(|leaf| !self.unresolved.contains(*leaf))
      .flat_map(|leaf| match self.ports.get(leaf) {
        Some(ports) => ports.exits.clone(),
        None => vec![leaf.clone()],
      })
      .collect()
  }
}

struct Flattener {
  options: FlattenOptions,
}

impl Flattener {
  fn flatten_level(
    &self,
    graph: &SourceGraph,
    depth: usize,
    include_resources: bool,
  ) -> Result<Level, FlattenError> {
    let mut level = Level {
      graph: FlatGraph::new(),
      ports: HashMap::new(),
      unresolved: HashSet::new(),
      first: None,
    };

    for node in &graph.nodes {
      match self.emit_node(node, depth, include_resources, &mut level.graph)? {
        Some(ports) => {
          level.ports.insert(node.id().to_string(), ports);
        }
        None => {
          level.unresolved.insert(node.id().to_string());
        }
      }
    }

    // The entry is the first node that was actually drawn.
    let first = graph
      .nodes
      .iter()
      .map(SourceNode::id)
      .find(|id| !level.unresolved.contains(*id))
      .map(str::to_string);
    level.first = first;

    // A graph's own resources hang off its entry node.
    if include_resources && let Some(owner) = level.first_ports().map(|p| p.entry.clone()) {
      attach_resources(&mut level.graph, &owner, &graph.managed_resources);
    }

    for edge in &graph.edges {
      if level.unresolved.contains(&edge.source) || level.unresolved.contains(&edge.target) {
        trace!(source = %edge.source, target = %edge.target, "dropping edge through unresolved sub-workflow");
        continue;
      }

      let target = level
        .ports
        .get(&edge.target)
        .map_or(edge.target.as_str(), |p| p.entry.as_str());
      let sources = level
        .ports
        .get(&edge.source)
        .map_or(std::slice::from_ref(&edge.source), |p| p.exits.as_slice());

      for source in sources {
        level.graph.insert_edge(FlatEdge::new(
          source.as_str(),
          target,
          edge.edge_type.is_dashed(),
        ));
      }
    }

    Ok(level)
  }

  fn emit_node(
    &self,
    node: &SourceNode,
    depth: usize,
    include_resources: bool,
    out: &mut FlatGraph,
  ) -> Result<Option<Ports>, FlattenError> {
    match node {
      SourceNode::ResourceFunction(_) | SourceNode::Default(_) => {
        out.insert_node(self.step_node(node.id(), node));
        if include_resources {
          attach_resources(out, node.id(), node.managed_resources());
        }
        Ok(Some(Ports::single(node.id())))
      }
      SourceNode::RefSwitch(switch) if self.options.expanded => self
        .expand_switch(switch, depth, include_resources, out)
        .map(Some),
      SourceNode::RefSwitch(switch) => {
        out.insert_node(self.collapsed_switch_node(node, switch));
        if include_resources {
          attach_resources(out, &switch.id, &switch.managed_resources);
        }
        Ok(Some(Ports::single(switch.id.as_str())))
      }
      SourceNode::SubWorkflow(sub) => self.emit_sub_workflow(sub, depth, include_resources, out),
    }
  }

  fn emit_sub_workflow(
    &self,
    sub: &SubWorkflowNode,
    depth: usize,
    include_resources: bool,
    out: &mut FlatGraph,
  ) -> Result<Option<Ports>, FlattenError> {
    let Some(first) = sub.workflow_graph.first_node() else {
      debug!(node_id = %sub.id, "skipping unresolved sub-workflow");
      return Ok(None);
    };

    if !self.options.expanded {
      let mut node = self.step_node(first.id(), first);
      node.display_kind = SUB_WORKFLOW_KIND.to_string();
      out.insert_node(node);
      if include_resources {
        attach_resources(out, first.id(), &sub.workflow_graph.managed_resources);
      }
      return Ok(Some(Ports::single(first.id())));
    }

    Ok(self.inline_sub_workflow(sub, depth)?.map(|(graph, ports)| {
      out.merge(graph);
      ports
    }))
  }

  /// Flatten an embedded workflow in place of its sub-workflow node.
  ///
  /// The embedded entry node takes over the sub-workflow's id and outgoing
  /// edges leave from the recorded leaves.
  fn inline_sub_workflow(
    &self,
    sub: &SubWorkflowNode,
    depth: usize,
  ) -> Result<Option<(FlatGraph, Ports)>, FlattenError> {
    check_depth(&sub.id, depth + 1)?;

    // Nested workflows always show their resources.
    let mut level = self.flatten_level(&sub.workflow_graph, depth + 1, true)?;
    let (Some(first_id), Some(first_ports)) = (level.first.clone(), level.first_ports().cloned())
    else {
      debug!(node_id = %sub.id, "skipping sub-workflow without a drawable entry");
      return Ok(None);
    };

    let mut ports = Ports {
      entry: first_ports.entry,
      exits: level.exits_of(&sub.workflow_leaf_node_ids),
    };

    if ports.entry == first_id {
      level.graph.rename_node(&first_id, &sub.id);
      ports.map_ids(&|id: &str| {
        if id == first_id {
          sub.id.clone()
        } else {
          id.to_string()
        }
      });
      if let Some(node) = level.graph.node_mut(&ports.entry) {
        node.display_kind = SUB_WORKFLOW_KIND.to_string();
      }
    }

    if ports.exits.is_empty() {
      ports.exits.push(ports.entry.clone());
    }

    Ok(Some((level.graph, ports)))
  }

  /// `switchIn-<id>` fans out to every case, every case's exits join at
  /// `switchOut-<id>`.
  fn expand_switch(
    &self,
    switch: &RefSwitchNode,
    depth: usize,
    include_resources: bool,
    out: &mut FlatGraph,
  ) -> Result<Ports, FlattenError> {
    check_depth(&switch.id, depth)?;

    let label = switch
      .metadata
      .as_ref()
      .and_then(|m| m.label.as_deref())
      .unwrap_or(REF_SWITCH_KIND);
    let switch_in = format!("switchIn-{}", switch.id);
    let switch_out = format!("switchOut-{}", switch.id);

    let mut in_node = FlatNode::new(&switch_in, label, "Switch In");
    in_node.default_collapsed = switch.metadata.as_ref().is_some_and(|m| m.default_collapsed);
    out.insert_node(in_node);
    out.insert_node(FlatNode::new(&switch_out, label, "Switch Out"));
    if include_resources {
      attach_resources(out, &switch_out, &switch.managed_resources);
    }

    for (key, case) in &switch.case_nodes {
      let Some((graph, ports)) = self.emit_case(switch, key, case, depth, include_resources)? else {
        continue;
      };
      out.merge(graph);
      out.insert_edge(FlatEdge::new(switch_in.as_str(), ports.entry.as_str(), false));
      for exit in &ports.exits {
        out.insert_edge(FlatEdge::new(exit.as_str(), switch_out.as_str(), false));
      }
    }

    Ok(Ports {
      entry: switch_in,
      exits: vec![switch_out],
    })
  }

  /// Build one case branch on its own, scoped under `<switch>/<key>`.
  fn emit_case(
    &self,
    switch: &RefSwitchNode,
    key: &str,
    case: &SourceNode,
    depth: usize,
    include_resources: bool,
  ) -> Result<Option<(FlatGraph, Ports)>, FlattenError> {
    let case_label = format!("case: {}", key);
    let prefix = format!("{}/{}/", switch.id, key);
    let scope = |id: &str| format!("{}{}", prefix, id);

    let (mut graph, mut ports) = match case {
      SourceNode::ResourceFunction(_) | SourceNode::Default(_) => {
        let id = format!("{}/{}", switch.id, key);
        let mut graph = FlatGraph::new();
        let mut node = self.step_node(&id, case);
        node.label = case_label;
        graph.insert_node(node);
        if include_resources {
          attach_resources(&mut graph, &id, case.managed_resources());
        }
        return Ok(Some((graph, Ports::single(id))));
      }
      SourceNode::SubWorkflow(sub) => match self.inline_sub_workflow(sub, depth)? {
        Some(inlined) => inlined,
        None => return Ok(None),
      },
      SourceNode::RefSwitch(inner) => {
        let mut graph = FlatGraph::new();
        let ports = self.expand_switch(inner, depth + 1, include_resources, &mut graph)?;
        (graph, ports)
      }
    };

    if let Some(node) = graph.node_mut(&ports.entry) {
      node.label = case_label;
    }
    graph.map_ids(&scope);
    ports.map_ids(&scope);

    Ok(Some((graph, ports)))
  }

  fn step_node(&self, id: &str, node: &SourceNode) -> FlatNode {
    let krm = node.krm();
    let label = node
      .label()
      .or_else(|| krm.and_then(KubernetesResource::name))
      .unwrap_or(id);
    let display_kind = krm.and_then(KubernetesResource::kind).unwrap_or("");

    let mut flat = FlatNode::new(id, label, display_kind);
    flat.resource = krm.cloned();
    flat.status = self.resource_status(krm);
    flat.default_collapsed = node.metadata().is_some_and(|m| m.default_collapsed);
    flat
  }

  /// One box for the whole switch; its health is the worst of its branches.
  fn collapsed_switch_node(&self, node: &SourceNode, switch: &RefSwitchNode) -> FlatNode {
    let mut flat = FlatNode::new(
      switch.id.as_str(),
      node.label().unwrap_or(REF_SWITCH_KIND),
      REF_SWITCH_KIND,
    );

    let mut resources = Vec::new();
    node.collect_resources(&mut resources);
    flat.status = if resources.is_empty() {
      self.resource_status(None)
    } else {
      NodeStatus::most_severe(resources.into_iter().map(NodeStatus::from_resource))
    };
    flat.default_collapsed = node.metadata().is_some_and(|m| m.default_collapsed);
    flat
  }

  fn resource_status(&self, krm: Option<&KubernetesResource>) -> NodeStatus {
    match krm {
      Some(resource) => NodeStatus::from_resource(resource),
      None if self.options.instance => NodeStatus::Interim,
      None => NodeStatus::None,
    }
  }
}

fn check_depth(node_id: &str, depth: usize) -> Result<(), FlattenError> {
  if depth > MAX_NESTING_DEPTH {
    return Err(FlattenError::NestingTooDeep {
      node_id: node_id.to_string(),
      limit: MAX_NESTING_DEPTH,
    });
  }
  Ok(())
}

/// One leaf node per managed resource, joined to its owner by a dashed edge.
fn attach_resources(out: &mut FlatGraph, owner: &str, resources: &[ManagedResource]) {
  for managed in resources {
    let resource = &managed.resource;
    let id = resource.node_id();

    let mut node = FlatNode::new(
      id.as_str(),
      resource.display_name(),
      resource.kind().unwrap_or("Resource"),
    );
    node.status = NodeStatus::from_resource(resource);
    node.no_background = managed.readonly;
    node.resource = Some(resource.clone());
    out.insert_node(node);

    out.insert_edge(FlatEdge::new(
      owner,
      id,
      EdgeType::StepToResource.is_dashed(),
    ));
  }
}
