use koreo_graph::FlattenError;
use koreo_provider::ProviderError;
use koreo_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  /// Nothing has been navigated to yet.
  #[error("no graph target selected")]
  NoTarget,

  #[error("failed to fetch graph: {0}")]
  Provider(#[from] ProviderError),

  #[error("failed to flatten graph: {0}")]
  Flatten(#[from] FlattenError),

  #[error("state store error: {0}")]
  Store(#[from] StoreError),
}
