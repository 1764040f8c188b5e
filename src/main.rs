use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use koreo_provider::{FsGraphProvider, GraphTarget};
use koreo_session::{
  ChannelNotifier, DiagramSession, DiagramView, NoopNotifier, Poller, SessionConfig, SessionEvent,
  SessionNotifier,
};
use koreo_store::{CollapseStore, FsStore, ViewMode, load_view, save_view};

/// Koreo - inspect workflow graphs from the terminal
#[derive(Parser)]
#[command(name = "koreo")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.koreo)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Render a workflow graph once
  Graph {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    display: DisplayArgs,

    /// Isolate the path through an edge (`<source>:<target>`)
    #[arg(long)]
    select_edge: Option<String>,
  },

  /// Keep a workflow graph loaded and report every refresh
  Watch {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    display: DisplayArgs,

    /// Refresh interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    interval_ms: u64,
  },

  /// Inspect or change the stored collapse state of a graph
  Collapse {
    #[command(subcommand)]
    action: CollapseAction,
  },

  /// Print or set the preferred view
  View {
    /// New preference: graph or list
    mode: Option<ViewMode>,
  },
}

#[derive(Subcommand)]
enum CollapseAction {
  /// Collapse a node, or expand it if it is collapsed
  Toggle {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    display: DisplayArgs,

    /// The node ID to toggle
    node: String,
  },

  /// Forget the stored state so defaults apply again
  Reset {
    #[command(flatten)]
    target: TargetArgs,
  },

  /// Print the collapsed node IDs
  Show {
    #[command(flatten)]
    target: TargetArgs,
  },
}

#[derive(Args)]
struct TargetArgs {
  /// Workflow namespace
  #[arg(short, long)]
  namespace: String,

  /// Workflow ID
  #[arg(short, long)]
  workflow: String,

  /// Instance ID; omit for the workflow definition
  #[arg(short, long)]
  instance: Option<String>,
}

impl TargetArgs {
  fn into_target(self) -> GraphTarget {
    GraphTarget {
      namespace: self.namespace,
      workflow_id: self.workflow,
      instance_id: self.instance,
    }
  }
}

#[derive(Args)]
struct DisplayArgs {
  /// Inline switch branches and sub-workflows
  #[arg(long)]
  expanded: bool,

  /// Leave managed resources out of the graph
  #[arg(long)]
  no_resources: bool,
}

impl DisplayArgs {
  fn config(&self) -> SessionConfig {
    SessionConfig {
      expanded: self.expanded,
      include_managed_resources: !self.no_resources,
      ..SessionConfig::default()
    }
  }
}

/// Where graphs are read from and diagram state is kept.
struct Paths {
  graphs: PathBuf,
  state: PathBuf,
}

impl Paths {
  fn new(data_dir: PathBuf) -> Self {
    Self {
      graphs: data_dir.join("graphs"),
      state: data_dir.join("state"),
    }
  }

  fn session<N: SessionNotifier>(
    &self,
    config: SessionConfig,
    notifier: N,
  ) -> DiagramSession<FsGraphProvider, FsStore, N> {
    DiagramSession::with_notifier(
      FsGraphProvider::new(&self.graphs),
      FsStore::new(&self.state),
      config,
      notifier,
    )
  }
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with(fmt::layer().with_writer(std::io::stderr))
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".koreo"),
  };
  let paths = Paths::new(data_dir);

  let Some(command) = cli.command else {
    println!("koreo - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Graph {
        target,
        display,
        select_edge,
      } => show_graph(&paths, target.into_target(), display, select_edge).await,
      Commands::Watch {
        target,
        display,
        interval_ms,
      } => watch_graph(&paths, target.into_target(), display, interval_ms).await,
      Commands::Collapse { action } => collapse(&paths, action).await,
      Commands::View { mode } => view(&paths, mode).await,
    }
  })
}

async fn show_graph(
  paths: &Paths,
  target: GraphTarget,
  display: DisplayArgs,
  select_edge: Option<String>,
) -> Result<()> {
  let session = paths.session(display.config(), NoopNotifier);
  session
    .navigate(target.clone())
    .await
    .with_context(|| format!("failed to load graph {}", target))?;

  if let Some(edge_id) = select_edge {
    if !session.select_edge(&edge_id).await {
      bail!("edge {} is not in graph {}", edge_id, target);
    }
  }

  let view = session.render().await;
  match load_view(&FsStore::new(&paths.state)).await? {
    ViewMode::Graph => println!("{}", serde_json::to_string_pretty(&view)?),
    ViewMode::List => print_list(&view),
  }

  Ok(())
}

fn print_list(view: &DiagramView) {
  for positioned in &view.nodes {
    let node = &positioned.node;
    println!("{}\t{}\t{}", node.id, node.display_kind, node.label);
  }
}

async fn watch_graph(
  paths: &Paths,
  target: GraphTarget,
  display: DisplayArgs,
  interval_ms: u64,
) -> Result<()> {
  let config = SessionConfig {
    poll_interval: Duration::from_millis(interval_ms),
    ..display.config()
  };
  let (notifier, mut events) = ChannelNotifier::channel();
  let session = Arc::new(paths.session(config, notifier));

  // a failing first load is reported like any later one
  if let Err(e) = session.navigate(target).await {
    warn!(error = %e, "initial load failed");
  }

  let cancel = CancellationToken::new();
  let poller = Poller::from_config(session.config());
  let handle = tokio::spawn(poller.run(session.clone(), cancel.clone()));

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => {
        eprintln!("Stopping");
        break;
      }
      event = events.recv() => {
        match event {
          Some(event) => print_event(&event),
          None => break,
        }
      }
    }
  }

  cancel.cancel();
  handle.await.context("poller task failed")?;
  Ok(())
}

fn print_event(event: &SessionEvent) {
  match event {
    SessionEvent::GraphLoaded {
      state_key,
      nodes,
      edges,
    } => println!("{}: {} nodes, {} edges", state_key, nodes, edges),
    SessionEvent::LoadFailed { state_key, error } => {
      eprintln!("{}: load failed: {}", state_key, error)
    }
    _ => {}
  }
}

async fn collapse(paths: &Paths, action: CollapseAction) -> Result<()> {
  let store = CollapseStore::new(FsStore::new(&paths.state));

  match action {
    CollapseAction::Toggle {
      target,
      display,
      node,
    } => {
      let target = target.into_target();
      let session = paths.session(display.config(), NoopNotifier);
      session
        .navigate(target.clone())
        .await
        .with_context(|| format!("failed to load graph {}", target))?;

      match session.toggle_collapse(&node).await? {
        Some(collapsed) => {
          println!("{} {}", node, if collapsed { "collapsed" } else { "expanded" })
        }
        None => bail!("node {} in graph {} cannot be collapsed", node, target),
      }
    }
    CollapseAction::Reset { target } => {
      store.reset(&target.into_target().state_key()).await?;
    }
    CollapseAction::Show { target } => {
      match store.get(&target.into_target().state_key()).await? {
        Some(ids) => {
          for id in ids {
            println!("{}", id);
          }
        }
        None => eprintln!("No stored collapse state"),
      }
    }
  }

  Ok(())
}

async fn view(paths: &Paths, mode: Option<ViewMode>) -> Result<()> {
  let store = FsStore::new(&paths.state);
  match mode {
    Some(mode) => save_view(&store, mode).await?,
    None => println!("{}", load_view(&store).await?),
  }
  Ok(())
}
