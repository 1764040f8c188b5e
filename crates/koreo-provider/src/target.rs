use std::fmt;

use serde::{Deserialize, Serialize};

/// Which graph to show: a workflow definition, or one of its instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTarget {
  pub namespace: String,
  pub workflow_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub instance_id: Option<String>,
}

impl GraphTarget {
  pub fn definition(namespace: impl Into<String>, workflow_id: impl Into<String>) -> Self {
    Self {
      namespace: namespace.into(),
      workflow_id: workflow_id.into(),
      instance_id: None,
    }
  }

  pub fn instance(
    namespace: impl Into<String>,
    workflow_id: impl Into<String>,
    instance_id: impl Into<String>,
  ) -> Self {
    Self {
      namespace: namespace.into(),
      workflow_id: workflow_id.into(),
      instance_id: Some(instance_id.into()),
    }
  }

  /// Instance graphs carry live resource state; definition graphs don't.
  pub fn is_instance(&self) -> bool {
    self.instance_id.is_some()
  }

  /// Key under which per-diagram state (collapse sets) is stored.
  pub fn state_key(&self) -> String {
    format!(
      "workflow:{}:{}:instance:{}",
      self.namespace,
      self.workflow_id,
      self.instance_id.as_deref().unwrap_or("null")
    )
  }
}

impl fmt::Display for GraphTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.namespace, self.workflow_id)?;
    if let Some(instance) = &self.instance_id {
      write!(f, "@{}", instance)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_state_key() {
    assert_eq!(
      GraphTarget::definition("default", "order").state_key(),
      "workflow:default:order:instance:null"
    );
    assert_eq!(
      GraphTarget::instance("default", "order", "order-abc").state_key(),
      "workflow:default:order:instance:order-abc"
    );
  }

  #[test]
  fn test_display() {
    assert_eq!(GraphTarget::definition("ns", "wf").to_string(), "ns/wf");
    assert_eq!(GraphTarget::instance("ns", "wf", "i").to_string(), "ns/wf@i");
  }
}
