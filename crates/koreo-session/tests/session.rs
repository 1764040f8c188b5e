use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use koreo_graph::{FlatNode, VisibleEdge};
use koreo_layout::{LayoutEngine, PositionedNode};
use koreo_provider::{GraphProvider, GraphTarget, ProviderError};
use koreo_session::{
  ChannelNotifier, DiagramSession, LoadOutcome, Poller, SessionConfig, SessionError, SessionEvent,
};
use koreo_source::SourceGraph;
use koreo_store::{CollapseStore, KeyValueStore, MemoryStore, StoreError};
use serde_json::json;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Serves canned graphs. Gated targets block until released.
#[derive(Default)]
struct MockProvider {
  graphs: Mutex<HashMap<GraphTarget, SourceGraph>>,
  gated: Mutex<HashSet<GraphTarget>>,
  started: Notify,
  release: Notify,
  fetches: AtomicUsize,
}

impl MockProvider {
  fn put(&self, target: &GraphTarget, graph: SourceGraph) {
    self.graphs.lock().unwrap().insert(target.clone(), graph);
  }

  fn remove(&self, target: &GraphTarget) {
    self.graphs.lock().unwrap().remove(target);
  }

  fn gate(&self, target: &GraphTarget) {
    self.gated.lock().unwrap().insert(target.clone());
  }

  fn fetches(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl GraphProvider for MockProvider {
  async fn fetch(&self, target: &GraphTarget) -> Result<SourceGraph, ProviderError> {
    self.fetches.fetch_add(1, Ordering::SeqCst);

    let gated = self.gated.lock().unwrap().contains(target);
    if gated {
      self.started.notify_one();
      self.release.notified().await;
    }

    self
      .graphs
      .lock()
      .unwrap()
      .get(target)
      .cloned()
      .ok_or_else(|| ProviderError::NotFound(target.clone()))
  }
}

/// Memory store whose writes block until released while `gated` is set.
#[derive(Default)]
struct GatedStore {
  inner: MemoryStore,
  gated: AtomicBool,
  started: Notify,
  release: Notify,
}

#[async_trait]
impl KeyValueStore for GatedStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    self.inner.get(key).await
  }

  async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    if self.gated.load(Ordering::SeqCst) {
      self.started.notify_one();
      self.release.notified().await;
    }
    self.inner.set(key, value).await
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    self.inner.remove(key).await
  }
}

/// Puts every node in one column, 50 apart.
struct ColumnLayout;

impl LayoutEngine for ColumnLayout {
  fn layout(&self, nodes: &[FlatNode], _edges: &[VisibleEdge]) -> Vec<PositionedNode> {
    nodes
      .iter()
      .enumerate()
      .map(|(i, node)| PositionedNode {
        node: node.clone(),
        x: 10.0,
        y: i as f64 * 50.0,
        width: 100.0,
        height: 20.0,
      })
      .collect()
  }
}

type TestSession = DiagramSession<Arc<MockProvider>, Arc<MemoryStore>, ChannelNotifier>;

fn session_with(
  provider: &Arc<MockProvider>,
  store: &Arc<MemoryStore>,
) -> (
  Arc<TestSession>,
  tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) {
  let (notifier, events) = ChannelNotifier::channel();
  let config = SessionConfig {
    include_managed_resources: false,
    ..SessionConfig::default()
  };
  let session = DiagramSession::with_notifier(provider.clone(), store.clone(), config, notifier);
  (Arc::new(session), events)
}

fn graph(value: serde_json::Value) -> SourceGraph {
  serde_json::from_value(value).unwrap()
}

/// a -> b -> c, a -> x. `a` starts collapsed.
fn chain() -> SourceGraph {
  graph(json!({
    "nodes": [
      { "type": "ResourceFunction", "id": "a", "metadata": { "defaultCollapsed": true } },
      { "type": "ResourceFunction", "id": "b" },
      { "type": "ResourceFunction", "id": "c" },
      { "type": "ResourceFunction", "id": "x" }
    ],
    "edges": [
      { "source": "a", "target": "b" },
      { "source": "b", "target": "c" },
      { "source": "a", "target": "x" }
    ]
  }))
}

fn ids(view_ids: impl IntoIterator<Item = String>) -> BTreeSet<String> {
  view_ids.into_iter().collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
  items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_first_load_seeds_default_collapse() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  assert_eq!(session.navigate(target).await.unwrap(), LoadOutcome::Applied);

  assert_eq!(session.collapsed().await, set(&["a"]));
  let view = session.render().await;
  assert_eq!(ids(view.nodes.iter().map(|n| n.node.id.clone())), set(&["a"]));
  assert!(view.edges.is_empty());
}

#[tokio::test]
async fn test_refresh_does_not_reseed_after_toggle() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target.clone()).await.unwrap();

  assert_eq!(session.toggle_collapse("a").await.unwrap(), Some(false));
  assert_eq!(session.refresh().await.unwrap(), LoadOutcome::Applied);
  assert!(session.collapsed().await.is_empty());
  assert_eq!(session.render().await.nodes.len(), 4);

  // a fresh session over the same store sees the user's state, not the defaults
  let (reopened, _events) = session_with(&provider, &store);
  reopened.navigate(target).await.unwrap();
  assert!(reopened.collapsed().await.is_empty());
}

#[tokio::test]
async fn test_collapse_state_is_per_target() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let definition = GraphTarget::definition("ns", "wf");
  let instance = GraphTarget::instance("ns", "wf", "run-1");
  provider.put(&definition, chain());
  provider.put(&instance, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(definition.clone()).await.unwrap();
  session.toggle_collapse("b").await.unwrap();
  assert_eq!(session.collapsed().await, set(&["a", "b"]));

  session.navigate(instance.clone()).await.unwrap();
  assert_eq!(session.collapsed().await, set(&["a"]));

  let collapse = CollapseStore::new(store.clone());
  assert_eq!(
    collapse.get(&definition.state_key()).await.unwrap(),
    Some(set(&["a", "b"]))
  );
  assert_eq!(
    collapse.get(&instance.state_key()).await.unwrap(),
    Some(set(&["a"]))
  );
}

#[tokio::test]
async fn test_toggle_ignores_leaves_and_unknown_nodes() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target).await.unwrap();

  assert_eq!(session.toggle_collapse("c").await.unwrap(), None);
  assert_eq!(session.toggle_collapse("missing").await.unwrap(), None);
  assert_eq!(session.collapsed().await, set(&["a"]));
}

#[tokio::test]
async fn test_toggle_on_fresh_store_keeps_seeded_defaults() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target.clone()).await.unwrap();
  assert_eq!(session.toggle_collapse("b").await.unwrap(), Some(true));
  assert_eq!(session.collapsed().await, set(&["a", "b"]));

  let (reopened, _events) = session_with(&provider, &store);
  reopened.navigate(target).await.unwrap();
  assert_eq!(reopened.collapsed().await, set(&["a", "b"]));
  assert_eq!(reopened.render().await.nodes.len(), 1);
}

#[tokio::test]
async fn test_unknown_node_toggle_writes_nothing_new() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target.clone()).await.unwrap();
  assert_eq!(session.toggle_collapse("ghost").await.unwrap(), None);

  let collapse = CollapseStore::new(store.clone());
  assert_eq!(
    collapse.get(&target.state_key()).await.unwrap(),
    Some(set(&["a"]))
  );
}

#[tokio::test]
async fn test_store_writes_do_not_hold_session_lock() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(GatedStore::default());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());
  store.gated.store(true, Ordering::SeqCst);

  let session = Arc::new(DiagramSession::new(
    provider.clone(),
    store.clone(),
    SessionConfig::default(),
  ));

  // first load blocks while seeding the collapse set
  let pending = {
    let session = session.clone();
    let target = target.clone();
    tokio::spawn(async move { session.navigate(target).await })
  };
  store.started.notified().await;

  let reads = async {
    session.set_expanded(true).await.unwrap();
    (session.target().await, session.collapsed().await)
  };
  let (current, collapsed) = tokio::time::timeout(Duration::from_secs(1), reads)
    .await
    .expect("session reads blocked behind a store write");
  assert_eq!(current, Some(target.clone()));
  assert!(collapsed.is_empty());

  store.release.notify_one();
  assert_eq!(pending.await.unwrap().unwrap(), LoadOutcome::Applied);
  assert_eq!(session.collapsed().await, set(&["a"]));
  // the option change made mid-load is reflected in the applied graph
  assert!(session.is_expanded().await);
  assert_eq!(provider.fetches(), 1);

  // a toggle's save blocks the same way
  let toggling = {
    let session = session.clone();
    tokio::spawn(async move { session.toggle_collapse("a").await })
  };
  store.started.notified().await;
  let collapsed = tokio::time::timeout(Duration::from_secs(1), session.collapsed())
    .await
    .expect("session reads blocked behind a toggle save");
  assert!(collapsed.is_empty());

  store.gated.store(false, Ordering::SeqCst);
  store.release.notify_one();
  assert_eq!(toggling.await.unwrap().unwrap(), Some(false));
  assert_eq!(
    store
      .get(&CollapseStore::<MemoryStore>::key(&target.state_key()))
      .await
      .unwrap()
      .as_deref(),
    Some("[]")
  );
}

#[tokio::test]
async fn test_managed_resources_toggle_without_fetch() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(
    &target,
    graph(json!({
      "nodes": [
        {
          "type": "ResourceFunction",
          "id": "a",
          "managedResources": [{
            "resource": {
              "kind": "Bucket",
              "metadata": { "name": "logs", "namespace": "default" }
            }
          }]
        },
        { "type": "ResourceFunction", "id": "b" }
      ],
      "edges": [{ "source": "a", "target": "b" }]
    })),
  );

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target).await.unwrap();
  assert_eq!(session.flat_graph().await.node_count(), 2);

  session.set_include_managed_resources(true).await.unwrap();
  let flat = session.flat_graph().await;
  assert_eq!(flat.node_count(), 3);
  assert!(flat.edge("a:Bucket/default/logs").unwrap().dashed);

  session.set_include_managed_resources(false).await.unwrap();
  assert_eq!(session.flat_graph().await.node_count(), 2);
  assert_eq!(provider.fetches(), 1);
}

#[tokio::test]
async fn test_render_uses_custom_layout() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let session = DiagramSession::new(provider.clone(), store.clone(), SessionConfig::default())
    .with_layout(ColumnLayout);
  session.navigate(target).await.unwrap();
  session.toggle_collapse("a").await.unwrap();

  let view = session.render().await;
  assert_eq!(view.nodes.len(), 4);
  assert!(view.nodes.iter().all(|n| n.x == 10.0 && n.width == 100.0));
  let ys: BTreeSet<i64> = view.nodes.iter().map(|n| n.y as i64).collect();
  assert_eq!(ys, [0, 50, 100, 150].into_iter().collect());
}

#[tokio::test]
async fn test_select_edge_isolates_path() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target).await.unwrap();
  session.toggle_collapse("a").await.unwrap();
  let before = session.render().await;

  assert!(session.select_edge("b:c").await);
  let view = session.render().await;
  assert_eq!(
    ids(view.nodes.iter().map(|n| n.node.id.clone())),
    set(&["a", "b", "c"])
  );
  assert!(view.has_edge("a:b"));
  assert!(view.has_edge("b:c"));
  assert!(!view.has_edge("a:x"));
  assert!(view.edges.iter().all(|e| e.highlighted));

  session.clear_selection().await;
  assert_eq!(session.render().await, before);

  assert!(!session.select_edge("c:a").await);
  assert_eq!(session.selected_edge().await, None);
}

#[tokio::test]
async fn test_refresh_keeps_selection_until_edge_vanishes() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target.clone()).await.unwrap();
  session.select_edge("b:c").await;

  session.refresh().await.unwrap();
  assert_eq!(session.selected_edge().await.as_deref(), Some("b:c"));

  provider.put(
    &target,
    graph(json!({
      "nodes": [
        { "type": "ResourceFunction", "id": "a" },
        { "type": "ResourceFunction", "id": "b" }
      ],
      "edges": [{ "source": "a", "target": "b" }]
    })),
  );
  session.refresh().await.unwrap();
  assert_eq!(session.selected_edge().await, None);
  // collapse ids survive even when their node is gone
  assert_eq!(session.collapsed().await, set(&["a"]));
}

#[tokio::test]
async fn test_navigate_supersedes_in_flight_load() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let slow = GraphTarget::definition("ns", "slow");
  let fast = GraphTarget::definition("ns", "fast");
  provider.put(&slow, chain());
  provider.put(
    &fast,
    graph(json!({ "nodes": [{ "type": "ResourceFunction", "id": "only" }] })),
  );
  provider.gate(&slow);

  let (session, mut events) = session_with(&provider, &store);

  let pending = {
    let session = session.clone();
    let slow = slow.clone();
    tokio::spawn(async move { session.navigate(slow).await })
  };
  provider.started.notified().await;

  assert_eq!(
    session.navigate(fast.clone()).await.unwrap(),
    LoadOutcome::Applied
  );
  assert_eq!(pending.await.unwrap().unwrap(), LoadOutcome::Superseded);

  assert_eq!(session.target().await, Some(fast.clone()));
  let flat = session.flat_graph().await;
  assert_eq!(flat.node_count(), 1);
  assert!(flat.contains_node("only"));

  let mut seen = Vec::new();
  while let Ok(event) = events.try_recv() {
    seen.push(event);
  }
  assert!(seen.contains(&SessionEvent::LoadSuperseded {
    state_key: slow.state_key()
  }));
  assert!(seen.contains(&SessionEvent::GraphLoaded {
    state_key: fast.state_key(),
    nodes: 1,
    edges: 0
  }));
}

#[tokio::test]
async fn test_set_expanded_reflattens_without_fetch() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(
    &target,
    graph(json!({
      "nodes": [
        { "type": "ResourceFunction", "id": "p" },
        {
          "type": "RefSwitch",
          "id": "s",
          "caseNodes": {
            "one": { "type": "ResourceFunction", "id": "f1" },
            "two": { "type": "ResourceFunction", "id": "f2" }
          }
        },
        { "type": "ResourceFunction", "id": "q" }
      ],
      "edges": [
        { "source": "p", "target": "s" },
        { "source": "s", "target": "q" }
      ]
    })),
  );

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target).await.unwrap();
  assert_eq!(session.flat_graph().await.node_count(), 3);

  session.set_expanded(true).await.unwrap();
  assert!(session.is_expanded().await);
  let flat = session.flat_graph().await;
  assert!(flat.contains_node("switchIn-s"));
  assert!(flat.contains_node("switchOut-s"));
  assert!(!flat.contains_node("s"));
  assert_eq!(provider.fetches(), 1);

  session.set_expanded(false).await.unwrap();
  assert_eq!(session.flat_graph().await.node_count(), 3);
}

#[tokio::test]
async fn test_fetch_failure_is_reported() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "missing");

  let (session, mut events) = session_with(&provider, &store);
  let result = session.navigate(target.clone()).await;
  assert!(matches!(
    result,
    Err(SessionError::Provider(ProviderError::NotFound(_)))
  ));

  match events.try_recv().unwrap() {
    SessionEvent::LoadFailed { state_key, .. } => assert_eq!(state_key, target.state_key()),
    other => panic!("unexpected event: {:?}", other),
  }

  // nothing was seeded for a graph that never loaded
  let key = CollapseStore::<MemoryStore>::key(&target.state_key());
  assert_eq!(store.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_refresh_without_target() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let (session, _events) = session_with(&provider, &store);

  assert!(matches!(session.refresh().await, Err(SessionError::NoTarget)));
}

#[tokio::test(start_paused = true)]
async fn test_poller_refreshes_until_cancelled() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target).await.unwrap();

  let cancel = CancellationToken::new();
  let poller = Poller::new(Duration::from_millis(1000));
  let handle = tokio::spawn(poller.run(session.clone(), cancel.clone()));

  tokio::time::sleep(Duration::from_millis(2500)).await;
  assert!(provider.fetches() >= 3);

  cancel.cancel();
  handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_poller_survives_failed_refresh() {
  let provider = Arc::new(MockProvider::default());
  let store = Arc::new(MemoryStore::new());
  let target = GraphTarget::definition("ns", "wf");
  provider.put(&target, chain());

  let (session, _events) = session_with(&provider, &store);
  session.navigate(target.clone()).await.unwrap();
  provider.remove(&target);

  let cancel = CancellationToken::new();
  let poller = Poller::new(Duration::from_millis(1000));
  let handle = tokio::spawn(poller.run(session.clone(), cancel.clone()));

  tokio::time::sleep(Duration::from_millis(2500)).await;
  assert!(provider.fetches() >= 3);
  // the last good graph stays on screen
  assert_eq!(session.flat_graph().await.node_count(), 4);

  cancel.cancel();
  handle.await.unwrap();
}
