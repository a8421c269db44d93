//! segments-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, starts the expiration sweeper and serves the JSON
//! API over HTTP until Ctrl-C or SIGTERM.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use segments_api::{AppState, ReportConfig};
use segments_core::service::AssignmentService;
use segments_server::{ServerConfig, Sweeper, config::expand_tilde, shutdown};
use segments_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "User segmentation service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
  anyhow::ensure!(
    server_cfg.sweep_interval_secs > 0,
    "sweep_interval_secs must be greater than zero"
  );

  // Open SQLite store.
  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let service = Arc::new(AssignmentService::new(Arc::new(store)));

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let sweeper =
    Sweeper::new(service.clone(), server_cfg.sweep_interval()).spawn(shutdown_rx.clone());

  let reports = ReportConfig {
    dir:      expand_tilde(&server_cfg.reports_dir),
    base_url: server_cfg.base_url.clone(),
  };
  let app = segments_api::api_router(AppState::new(service, reports));

  let address = server_cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("Listening on http://{address}");

  tokio::spawn(shutdown::broadcast_on_signal(shutdown_tx));

  let mut server_rx = shutdown_rx;
  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      let _ = server_rx.wait_for(|stop| *stop).await;
    })
    .await
    .context("server error")?;

  sweeper.await.context("sweeper task panicked")?;
  tracing::info!("shutdown complete");

  Ok(())
}
