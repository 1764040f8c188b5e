//! Koreo Session
//!
//! Ties the pieces together for one open diagram: fetches the source graph
//! through a [`GraphProvider`](koreo_provider::GraphProvider), flattens it,
//! keeps the user's collapse and selection state across refreshes, and
//! renders a positioned [`DiagramView`].
//!
//! ```ignore
//! let session = Arc::new(DiagramSession::new(provider, store, SessionConfig::default()));
//! session.navigate(GraphTarget::definition("default", "order")).await?;
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn(Poller::from_config(session.config()).run(session.clone(), cancel.clone()));
//! ```

mod config;
mod error;
mod events;
mod poller;
mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use events::{ChannelNotifier, NoopNotifier, SessionEvent, SessionNotifier};
pub use poller::Poller;
pub use session::{DiagramSession, DiagramView, LoadOutcome};
