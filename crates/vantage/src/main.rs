//! Vantage server binary: load settings, restore the session snapshot,
//! and serve until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use vantage_server::{AppState, metrics};
use vantage_sessions::{SessionStore, SnapshotStore};
use vantage_settings::load_settings;

/// Live visitor-session presence and admin observation server.
#[derive(Debug, Parser)]
#[command(name = "vantage", version, about)]
struct Cli {
    /// Path to a JSON settings file (deep-merged over defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Session snapshot file (overrides settings).
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Tracing filter directive (overrides settings), e.g. `debug`.
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(snapshot) = cli.snapshot {
        settings.snapshot.path = snapshot.display().to_string();
    }
    if let Some(log) = cli.log {
        settings.logging.filter = log;
    }

    vantage_core::logging::init(Some(&settings.logging.filter));
    let handle = metrics::install_recorder();

    let store = SessionStore::open(SnapshotStore::new(&settings.snapshot.path))
        .context("failed to restore session snapshot")?;
    info!(
        sessions = store.len(),
        snapshot = %settings.snapshot.path,
        "session registry ready"
    );

    let state = AppState::new(Arc::new(store), handle);
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("invalid listen address")?;

    vantage_server::serve(addr, state)
        .await
        .context("server error")
}
