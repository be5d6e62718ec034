//! Metrica server entrypoint.

use anyhow::Context;
use clap::Parser;
use metrica_api::create_router;
use metrica_server::{ServerConfig, build};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metrica")]
#[command(author, version, about = "Account activity metrics renderer", long_about = None)]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port, overrides the configuration file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Mocked data, all optimizations, no cache, every plugin enabled.
    #[arg(long)]
    sandbox: bool,

    /// Bypass caching and coalescing, verbose logs.
    #[arg(long)]
    debug: bool,
}

fn init_tracing(config: &ServerConfig) {
    let fallback = if config.debug { "info,metrica=debug" } else { "info" };
    let default = config.log.level.as_deref().unwrap_or(fallback);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.debug {
        config.debug = true;
    }
    if cli.sandbox {
        config.apply_sandbox();
    }
    config.resolve_token();

    init_tracing(&config);

    let app = build(&config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tracker = app.tracker.as_ref().map(|tracker| tracker.spawn(shutdown_rx));

    let address = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %address, version = env!("CARGO_PKG_VERSION"), "Metrica listening");

    axum::serve(listener, create_router(app.state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = tracker {
        let _ = handle.await;
    }
    info!("Metrica stopped");
    Ok(())
}
