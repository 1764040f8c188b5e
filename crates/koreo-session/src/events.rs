//! Session events and notifiers.
//!
//! Events let a front end react to loads and state changes without polling
//! the session.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by a [`DiagramSession`](crate::DiagramSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
  /// A fetched graph was applied.
  GraphLoaded {
    state_key: String,
    nodes: usize,
    edges: usize,
  },

  /// A response arrived for a target that is no longer current and was dropped.
  LoadSuperseded { state_key: String },

  LoadFailed { state_key: String, error: String },

  CollapseToggled {
    state_key: String,
    node_id: String,
    collapsed: bool,
  },

  SelectionChanged {
    state_key: String,
    edge_id: Option<String>,
  },
}

/// Receives session events.
pub trait SessionNotifier: Send + Sync {
  fn notify(&self, event: SessionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl SessionNotifier for NoopNotifier {
  fn notify(&self, _event: SessionEvent) {}
}

/// Forwards events to an unbounded channel.
///
/// Sending never blocks the session; event volume is one per load or
/// user action.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl SessionNotifier for ChannelNotifier {
  fn notify(&self, event: SessionEvent) {
    // receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
