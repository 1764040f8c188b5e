//! Health derived from a resource's status conditions.

use koreo_source::KubernetesResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeStatus {
  Healthy,
  Interim,
  InProgress,
  Error,
  #[default]
  None,
}

impl NodeStatus {
  /// Read the `Ready` / `ACK.ResourceSynced` conditions of a resource.
  ///
  /// Later conditions win over earlier ones.
  pub fn from_resource(resource: &KubernetesResource) -> Self {
    let Some(status) = resource.status() else {
      return NodeStatus::Healthy;
    };
    let Some(conditions) = status.get("conditions").and_then(Value::as_array) else {
      return NodeStatus::Healthy;
    };

    let terminal_state = status
      .get("terminalCondition")
      .and_then(|t| t.get("state"))
      .and_then(Value::as_str);
    if terminal_state == Some("CONDITION_FAILED") {
      return NodeStatus::Error;
    }

    let mut result = NodeStatus::Healthy;
    for condition in conditions {
      let field = |name: &str| condition.get(name).and_then(Value::as_str);
      let reason = field("reason");

      match field("type") {
        Some("Ready") => {
          result = if field("status") == Some("False") {
            match reason {
              Some("Updating" | "RetryWait") => NodeStatus::InProgress,
              _ => NodeStatus::Error,
            }
          } else {
            match reason {
              Some("Waiting" | "Wait" | "DepSkip") => NodeStatus::InProgress,
              Some("UpToDate" | "Ready") => NodeStatus::Healthy,
              _ => NodeStatus::Error,
            }
          };
        }
        // AWS ACK
        Some("ACK.ResourceSynced") => {
          result = if field("status") == Some("True") {
            NodeStatus::Healthy
          } else {
            NodeStatus::Error
          };
        }
        _ => {}
      }
    }

    result
  }

  fn severity(self) -> u8 {
    match self {
      NodeStatus::None => 0,
      NodeStatus::Healthy => 1,
      NodeStatus::Interim => 2,
      NodeStatus::InProgress => 3,
      NodeStatus::Error => 4,
    }
  }

  /// The worst of several statuses; `None` for an empty input.
  pub fn most_severe(statuses: impl IntoIterator<Item = NodeStatus>) -> NodeStatus {
    statuses
      .into_iter()
      .max_by_key(|s| s.severity())
      .unwrap_or(NodeStatus::None)
  }
}
