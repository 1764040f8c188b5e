//! Koreo Provider
//!
//! Where source graphs come from. The diagram session only sees the
//! [`GraphProvider`] trait; [`FsGraphProvider`] serves graphs exported to a
//! directory tree.

mod error;
mod fs_provider;
mod target;

pub use error::ProviderError;
pub use fs_provider::FsGraphProvider;
pub use target::GraphTarget;

use std::sync::Arc;

use async_trait::async_trait;
use koreo_source::SourceGraph;

/// Fetches the source graph of a workflow definition or instance.
#[async_trait]
pub trait GraphProvider: Send + Sync {
  async fn fetch(&self, target: &GraphTarget) -> Result<SourceGraph, ProviderError>;
}

#[async_trait]
impl<T: GraphProvider + ?Sized> GraphProvider for Arc<T> {
  async fn fetch(&self, target: &GraphTarget) -> Result<SourceGraph, ProviderError> {
    (**self).fetch(target).await
  }
}
