//! Task server daemon.
//!
//! Loads the TOML configuration, starts the scheduler, and serves the
//! command protocol over HTTP until a stop command or Ctrl+C arrives.
//!
//! All tracing output goes to stderr.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use taskserv::config::DaemonConfig;
use taskserv::server::{CommandServer, DEFAULT_PORT};
use taskserv::startup;
use taskserv::supervisor::ShutdownSignal;

/// Task scheduling server speaking the XML command protocol.
#[derive(Parser)]
#[command(name = "taskservd", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket address to listen on (overrides the configuration file).
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Shorthand for `--listen 0.0.0.0:<port>`.
    #[arg(short, long, conflicts_with = "listen")]
    port: Option<u16>,
}

fn resolve_bind(cli: &Cli, config: &DaemonConfig) -> SocketAddr {
    if let Some(listen) = cli.listen {
        return listen;
    }
    if let Some(port) = cli.port {
        return SocketAddr::from(([0, 0, 0, 0], port));
    }
    config
        .listen
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => DaemonConfig::from_file(path).map_err(|e| {
            tracing::error!(error = %e, "failed to load configuration");
            anyhow::anyhow!("failed to load configuration: {e}")
        })?,
        None => DaemonConfig::default(),
    };
    let bind = resolve_bind(&cli, &config);

    let app = startup::init(&config.service, config.tasks, ShutdownSignal::new()).map_err(
        |e| {
            tracing::error!(error = %e, "startup failed");
            anyhow::anyhow!("startup failed: {e}")
        },
    )?;

    let server = CommandServer::start(
        Arc::clone(&app.dispatcher),
        app.supervisor.signal().clone(),
        bind,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "server failed to start");
        anyhow::anyhow!("server failed to start: {e}")
    })?;

    info!(
        "taskservd v{} ready on port {}",
        env!("CARGO_PKG_VERSION"),
        server.port()
    );

    // Ctrl+C takes the same drain path as a stop command.
    let supervisor = Arc::clone(&app.supervisor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            supervisor.stop().await;
        }
    });

    server.closed().await?;
    app.supervisor.join().await?;

    info!("taskservd shut down cleanly");
    Ok(())
}
