//! Background refresh of an open diagram.

use std::sync::Arc;
use std::time::Duration;

use koreo_provider::GraphProvider;
use koreo_store::KeyValueStore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::events::SessionNotifier;
use crate::session::{DiagramSession, LoadOutcome};

/// Refreshes a session on a fixed interval until cancelled.
///
/// A failed refresh is logged and polling carries on with the next tick.
#[derive(Debug, Clone)]
pub struct Poller {
  interval: Duration,
}

impl Poller {
  pub fn new(interval: Duration) -> Self {
    Self { interval }
  }

  pub fn from_config(config: &SessionConfig) -> Self {
    Self::new(config.poll_interval)
  }

  /// Run until `cancel` fires. The first refresh happens one interval in.
  pub async fn run<P, S, N>(self, session: Arc<DiagramSession<P, S, N>>, cancel: CancellationToken)
  where
    P: GraphProvider,
    S: KeyValueStore,
    N: SessionNotifier,
  {
    info!(interval_ms = self.interval.as_millis() as u64, "starting graph poller");

    let start = tokio::time::Instant::now() + self.interval;
    let mut ticker = tokio::time::interval_at(start, self.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("graph poller cancelled");
          break;
        }
        _ = ticker.tick() => {
          match session.refresh().await {
            Ok(LoadOutcome::Applied) => debug!("poll refresh applied"),
            Ok(LoadOutcome::Superseded) => debug!("poll refresh superseded"),
            Err(e) => warn!(error = %e, "poll refresh failed"),
          }
        }
      }
    }
  }
}
