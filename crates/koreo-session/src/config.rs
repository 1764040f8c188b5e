use std::time::Duration;

/// Interval between background refreshes of an open diagram.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Initial settings for a [`DiagramSession`](crate::DiagramSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
  /// Start with switches and sub-workflows inlined.
  pub expanded: bool,
  /// Draw managed resources as leaf nodes.
  pub include_managed_resources: bool,
  pub poll_interval: Duration,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      expanded: false,
      include_managed_resources: true,
      poll_interval: DEFAULT_POLL_INTERVAL,
    }
  }
}
