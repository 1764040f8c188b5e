use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An arbitrary Kubernetes object, kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KubernetesResource(Value);

impl KubernetesResource {
  pub fn new(value: Value) -> Self {
    Self(value)
  }

  pub fn kind(&self) -> Option<&str> {
    self.0.get("kind").and_then(Value::as_str)
  }

  pub fn name(&self) -> Option<&str> {
    self.metadata_str("name")
  }

  pub fn namespace(&self) -> Option<&str> {
    self.metadata_str("namespace")
  }

  pub fn uid(&self) -> Option<&str> {
    self.metadata_str("uid")
  }

  pub fn status(&self) -> Option<&Value> {
    self.0.get("status")
  }

  /// `spec.displayName` if set, then `metadata.name`, then `"n/a"`.
  pub fn display_name(&self) -> &str {
    self
      .0
      .get("spec")
      .and_then(|spec| spec.get("displayName"))
      .and_then(Value::as_str)
      .or_else(|| self.name())
      .unwrap_or("n/a")
  }

  /// Stable identity for drawing: the UID, or `kind/namespace/name`.
  pub fn node_id(&self) -> String {
    match self.uid() {
      Some(uid) => uid.to_string(),
      None => format!(
        "{}/{}/{}",
        self.kind().unwrap_or_default(),
        self.namespace().unwrap_or_default(),
        self.name().unwrap_or_default()
      ),
    }
  }

  fn metadata_str(&self, field: &str) -> Option<&str> {
    self
      .0
      .get("metadata")
      .and_then(|m| m.get(field))
      .and_then(Value::as_str)
  }
}

/// A resource created or owned by a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedResource {
  pub resource: KubernetesResource,
  #[serde(default)]
  pub readonly: bool,
}
