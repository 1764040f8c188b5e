use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::SourceGraph;
use crate::resource::{KubernetesResource, ManagedResource};

/// Display metadata attached to a node by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  /// Start with this node's subtree hidden when no collapse state is stored.
  #[serde(default)]
  pub default_collapsed: bool,
}

/// A single step managing (at most) one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFunctionNode {
  pub id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub krm: Option<KubernetesResource>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<NodeMetadata>,
  #[serde(default)]
  pub managed_resources: Vec<ManagedResource>,
}

/// A conditional branch point. Keys are case names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefSwitchNode {
  pub id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<NodeMetadata>,
  #[serde(default)]
  pub case_nodes: BTreeMap<String, SourceNode>,
  #[serde(default)]
  pub managed_resources: Vec<ManagedResource>,
}

/// A step that invokes a whole other workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWorkflowNode {
  pub id: String,
  /// Empty when the backend could not resolve the sub-workflow.
  pub workflow_graph: SourceGraph,
  /// Terminal nodes of the embedded graph.
  #[serde(default)]
  pub workflow_leaf_node_ids: Vec<String>,
}

/// Fallback kind carrying only a resource and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericNode {
  pub id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub krm: Option<KubernetesResource>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<NodeMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceNode {
  ResourceFunction(ResourceFunctionNode),
  RefSwitch(RefSwitchNode),
  SubWorkflow(SubWorkflowNode),
  Default(GenericNode),
}

impl SourceNode {
  pub fn id(&self) -> &str {
    match self {
      SourceNode::ResourceFunction(n) => &n.id,
      SourceNode::RefSwitch(n) => &n.id,
      SourceNode::SubWorkflow(n) => &n.id,
      SourceNode::Default(n) => &n.id,
    }
  }

  pub fn metadata(&self) -> Option<&NodeMetadata> {
    match self {
      SourceNode::ResourceFunction(n) => n.metadata.as_ref(),
      SourceNode::RefSwitch(n) => n.metadata.as_ref(),
      SourceNode::SubWorkflow(_) => None,
      SourceNode::Default(n) => n.metadata.as_ref(),
    }
  }

  pub fn label(&self) -> Option<&str> {
    self.metadata().and_then(|m| m.label.as_deref())
  }

  /// The resource this node itself stands for, if any.
  pub fn krm(&self) -> Option<&KubernetesResource> {
    match self {
      SourceNode::ResourceFunction(n) => n.krm.as_ref(),
      SourceNode::Default(n) => n.krm.as_ref(),
      SourceNode::RefSwitch(_) | SourceNode::SubWorkflow(_) => None,
    }
  }

  pub fn managed_resources(&self) -> &[ManagedResource] {
    match self {
      SourceNode::ResourceFunction(n) => &n.managed_resources,
      SourceNode::RefSwitch(n) => &n.managed_resources,
      SourceNode::SubWorkflow(n) => &n.workflow_graph.managed_resources,
      SourceNode::Default(_) => &[],
    }
  }

  /// Every resource reachable below this node, including case branches and
  /// embedded workflows.
  pub fn collect_resources<'a>(&'a self, out: &mut Vec<&'a KubernetesResource>) {
    if let Some(krm) = self.krm() {
      out.push(krm);
    }
    match self {
      SourceNode::RefSwitch(switch) => {
        for case in switch.case_nodes.values() {
          case.collect_resources(out);
        }
      }
      SourceNode::SubWorkflow(sub) => {
        for node in &sub.workflow_graph.nodes {
          node.collect_resources(out);
        }
      }
      SourceNode::ResourceFunction(_) | SourceNode::Default(_) => {}
    }
  }
}
