use crate::GraphTarget;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
  #[error("graph not found: {0}")]
  NotFound(GraphTarget),

  #[error("invalid target component: {0:?}")]
  InvalidTarget(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to parse graph: {0}")]
  Parse(#[from] serde_json::Error),
}
