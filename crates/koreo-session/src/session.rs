use std::collections::BTreeSet;

use koreo_graph::{FlatGraph, FlattenOptions, VisibleEdge, compute_visible, flatten_with};
use koreo_layout::{LayeredLayout, LayoutEngine, PositionedNode};
use koreo_provider::{GraphProvider, GraphTarget};
use koreo_source::SourceGraph;
use koreo_store::{CollapseStore, KeyValueStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{NoopNotifier, SessionEvent, SessionNotifier};

/// What a load did with the response it got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
  Applied,
  /// The target changed while the fetch was in flight; the response was dropped.
  Superseded,
}

/// A rendered diagram: positioned visible nodes and their edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramView {
  pub nodes: Vec<PositionedNode>,
  pub edges: Vec<VisibleEdge>,
}

impl DiagramView {
  pub fn node(&self, node_id: &str) -> Option<&PositionedNode> {
    self.nodes.iter().find(|n| n.node.id == node_id)
  }

  pub fn has_edge(&self, edge_id: &str) -> bool {
    self.edges.iter().any(|e| e.edge.id == edge_id)
  }
}

struct SessionState {
  target: Option<GraphTarget>,
  /// Bumped on every navigation; a load only applies if it still matches.
  generation: u64,
  cancel: CancellationToken,
  source: Option<SourceGraph>,
  flat: FlatGraph,
  collapsed: BTreeSet<String>,
  collapse_initialized: bool,
  selected_edge: Option<String>,
  expanded: bool,
  include_managed_resources: bool,
}

impl SessionState {
  fn options(&self) -> FlattenOptions {
    FlattenOptions {
      expanded: self.expanded,
      include_managed_resources: self.include_managed_resources,
      instance: self.target.as_ref().is_some_and(GraphTarget::is_instance),
    }
  }

  fn state_key(&self) -> String {
    self
      .target
      .as_ref()
      .map(GraphTarget::state_key)
      .unwrap_or_default()
  }

  /// Rebuild the flat graph from the cached source. Collapse ids are kept
  /// as they are; a selection whose edge vanished is dropped.
  fn reflatten(&mut self) -> Result<(), SessionError> {
    if let Some(source) = &self.source {
      self.flat = flatten_with(source, &self.options())?;
    }
    self.drop_stale_selection();
    Ok(())
  }

  fn drop_stale_selection(&mut self) -> bool {
    match &self.selected_edge {
      Some(edge_id) if self.flat.edge(edge_id).is_none() => {
        debug!(edge_id = %edge_id, "selected edge no longer present");
        self.selected_edge = None;
        true
      }
      _ => false,
    }
  }
}

/// One open diagram.
///
/// All methods take `&self`; share the session behind an `Arc` to let a
/// [`Poller`](crate::Poller) refresh it while user actions come in. The
/// state lock is never held while waiting on the provider or the store.
pub struct DiagramSession<P, S, N = NoopNotifier> {
  provider: P,
  collapse: CollapseStore<S>,
  notifier: N,
  layout: Box<dyn LayoutEngine>,
  config: SessionConfig,
  state: Mutex<SessionState>,
  /// Serializes collapse-store writes; always taken after `state`, never before.
  persist: Mutex<()>,
}

impl<P, S> DiagramSession<P, S, NoopNotifier>
where
  P: GraphProvider,
  S: KeyValueStore,
{
  pub fn new(provider: P, store: S, config: SessionConfig) -> Self {
    Self::with_notifier(provider, store, config, NoopNotifier)
  }
}

impl<P, S, N> DiagramSession<P, S, N>
where
  P: GraphProvider,
  S: KeyValueStore,
  N: SessionNotifier,
{
  pub fn with_notifier(provider: P, store: S, config: SessionConfig, notifier: N) -> Self {
    let state = SessionState {
      target: None,
      generation: 0,
      cancel: CancellationToken::new(),
      source: None,
      flat: FlatGraph::new(),
      collapsed: BTreeSet::new(),
      collapse_initialized: false,
      selected_edge: None,
      expanded: config.expanded,
      include_managed_resources: config.include_managed_resources,
    };

    Self {
      provider,
      collapse: CollapseStore::new(store),
      notifier,
      layout: Box::new(LayeredLayout::default()),
      config,
      state: Mutex::new(state),
      persist: Mutex::new(()),
    }
  }

  /// Replace the layout used by [`render`](Self::render).
  pub fn with_layout(mut self, layout: impl LayoutEngine + 'static) -> Self {
    self.layout = Box::new(layout);
    self
  }

  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  /// Switch to another graph and load it.
  ///
  /// Any load still in flight for the previous target is cancelled. The
  /// selection is cleared and collapse state is re-read for the new target.
  #[instrument(
    name = "session_navigate",
    skip(self, target),
    fields(state_key = %target.state_key())
  )]
  pub async fn navigate(&self, target: GraphTarget) -> Result<LoadOutcome, SessionError> {
    {
      let mut state = self.state.lock().await;
      state.cancel.cancel();
      state.cancel = CancellationToken::new();
      state.generation += 1;
      state.target = Some(target);
      state.source = None;
      state.flat = FlatGraph::new();
      state.collapsed.clear();
      state.collapse_initialized = false;
      state.selected_edge = None;
    }

    self.load().await
  }

  /// Refetch the current target, keeping collapse and selection state.
  #[instrument(name = "session_refresh", skip(self))]
  pub async fn refresh(&self) -> Result<LoadOutcome, SessionError> {
    self.load().await
  }

  async fn load(&self) -> Result<LoadOutcome, SessionError> {
    let (target, generation, cancel) = {
      let state = self.state.lock().await;
      let target = state.target.clone().ok_or(SessionError::NoTarget)?;
      (target, state.generation, state.cancel.clone())
    };
    let state_key = target.state_key();

    let fetched = tokio::select! {
      _ = cancel.cancelled() => None,
      result = self.provider.fetch(&target) => Some(result),
    };

    let (options, needs_seed) = {
      let state = self.state.lock().await;
      if fetched.is_none() || state.generation != generation {
        return Ok(self.superseded(state_key));
      }
      (state.options(), !state.collapse_initialized)
    };

    let source = match fetched {
      Some(Ok(source)) => source,
      Some(Err(e)) => {
        warn!(state_key = %state_key, error = %e, "graph fetch failed");
        self.notifier.notify(SessionEvent::LoadFailed {
          state_key,
          error: e.to_string(),
        });
        return Err(e.into());
      }
      None => return Ok(self.superseded(state_key)),
    };

    let mut flat = match flatten_with(&source, &options) {
      Ok(flat) => flat,
      Err(e) => {
        warn!(state_key = %state_key, error = %e, "graph could not be flattened");
        self.notifier.notify(SessionEvent::LoadFailed {
          state_key,
          error: e.to_string(),
        });
        return Err(e.into());
      }
    };

    let seeded = if needs_seed {
      let _persist = self.persist.lock().await;
      Some(
        self
          .collapse
          .load(&state_key, &flat.default_collapsed())
          .await?,
      )
    } else {
      None
    };

    let mut state = self.state.lock().await;
    if state.generation != generation {
      return Ok(self.superseded(state_key));
    }
    // Display options may have changed while the lock was released.
    if state.options() != options {
      flat = flatten_with(&source, &state.options())?;
    }
    if let Some(collapsed) = seeded
      && !state.collapse_initialized
    {
      state.collapsed = collapsed;
      state.collapse_initialized = true;
    }

    state.source = Some(source);
    state.flat = flat;
    state.drop_stale_selection();

    info!(
      state_key = %state_key,
      nodes = state.flat.node_count(),
      edges = state.flat.edge_count(),
      collapsed = state.collapsed.len(),
      "graph loaded"
    );
    self.notifier.notify(SessionEvent::GraphLoaded {
      state_key,
      nodes: state.flat.node_count(),
      edges: state.flat.edge_count(),
    });

    Ok(LoadOutcome::Applied)
  }

  fn superseded(&self, state_key: String) -> LoadOutcome {
    debug!(state_key = %state_key, "discarding superseded graph response");
    self.notifier.notify(SessionEvent::LoadSuperseded { state_key });
    LoadOutcome::Superseded
  }

  /// Switch between collapsed and expanded flattening without refetching.
  pub async fn set_expanded(&self, expanded: bool) -> Result<(), SessionError> {
    let mut state = self.state.lock().await;
    if state.expanded == expanded {
      return Ok(());
    }
    state.expanded = expanded;
    state.reflatten()
  }

  pub async fn set_include_managed_resources(&self, include: bool) -> Result<(), SessionError> {
    let mut state = self.state.lock().await;
    if state.include_managed_resources == include {
      return Ok(());
    }
    state.include_managed_resources = include;
    state.reflatten()
  }

  /// Collapse or expand a node's subtree and persist the change.
  ///
  /// Returns the node's new collapsed state, or `None` when the node cannot
  /// be collapsed (unknown, or nothing downstream). Expanding a node that is
  /// already collapsed is always allowed.
  pub async fn toggle_collapse(&self, node_id: &str) -> Result<Option<bool>, SessionError> {
    let mut state = self.state.lock().await;

    let collapsed = if state.collapsed.remove(node_id) {
      false
    } else if state.flat.node(node_id).is_some_and(|n| n.collapsible) {
      state.collapsed.insert(node_id.to_string());
      true
    } else {
      debug!(node_id = %node_id, "ignoring collapse of non-collapsible node");
      return Ok(None);
    };

    let state_key = state.state_key();
    let snapshot = state.collapsed.clone();
    // Take the persist lock before releasing state so saves land in toggle order.
    let _persist = self.persist.lock().await;
    drop(state);
    self.collapse.save(&state_key, &snapshot).await?;

    self.notifier.notify(SessionEvent::CollapseToggled {
      state_key,
      node_id: node_id.to_string(),
      collapsed,
    });
    Ok(Some(collapsed))
  }

  /// Isolate the path through an edge. Returns false if the edge is unknown.
  pub async fn select_edge(&self, edge_id: &str) -> bool {
    let mut state = self.state.lock().await;
    if state.flat.edge(edge_id).is_none() {
      debug!(edge_id = %edge_id, "ignoring selection of unknown edge");
      return false;
    }

    state.selected_edge = Some(edge_id.to_string());
    self.notifier.notify(SessionEvent::SelectionChanged {
      state_key: state.state_key(),
      edge_id: Some(edge_id.to_string()),
    });
    true
  }

  pub async fn clear_selection(&self) {
    let mut state = self.state.lock().await;
    if state.selected_edge.take().is_some() {
      self.notifier.notify(SessionEvent::SelectionChanged {
        state_key: state.state_key(),
        edge_id: None,
      });
    }
  }

  /// Visible nodes with positions, and visible edges with highlighting.
  pub async fn render(&self) -> DiagramView {
    let state = self.state.lock().await;
    let visible = compute_visible(&state.flat, &state.collapsed, state.selected_edge.as_deref());
    let nodes = self.layout.layout(&visible.nodes, &visible.edges);

    DiagramView {
      nodes,
      edges: visible.edges,
    }
  }

  pub async fn target(&self) -> Option<GraphTarget> {
    self.state.lock().await.target.clone()
  }

  pub async fn collapsed(&self) -> BTreeSet<String> {
    self.state.lock().await.collapsed.clone()
  }

  pub async fn selected_edge(&self) -> Option<String> {
    self.state.lock().await.selected_edge.clone()
  }

  pub async fn is_expanded(&self) -> bool {
    self.state.lock().await.expanded
  }

  /// The current flat graph, before visibility filtering.
  pub async fn flat_graph(&self) -> FlatGraph {
    self.state.lock().await.flat.clone()
  }
}
