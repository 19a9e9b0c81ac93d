//! # sitelens
//!
//! Sitelens analytics engine binary — wires together settings, the
//! per-tenant stores, the ingestion pipeline, and the HTTP server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitelens_core::period::parse_timezone;
use sitelens_ingest::{EventQueue, Sessionizer, Worker};
use sitelens_server::SitelensServer;
use sitelens_store::{backfill, StoreRegistry};

/// Sitelens analytics server.
#[derive(Parser, Debug)]
#[command(name = "sitelens", about = "Sitelens analytics server")]
struct Cli {
    /// Path to the settings file.
    #[arg(long, default_value = "sitelens.json")]
    config: PathBuf,

    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings if specified, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Data directory (overrides settings if specified).
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    sitelens_settings::init_settings_from_path(&args.config)
        .with_context(|| format!("failed to load settings from {}", args.config.display()))?;
    let settings = sitelens_settings::get_settings();

    // Fail fast on a bad timezone instead of on the first query.
    let _ = parse_timezone(&settings.analytics.timezone)
        .with_context(|| format!("invalid timezone '{}'", settings.analytics.timezone))?;

    let data_dir = args
        .data_dir
        .unwrap_or_else(|| PathBuf::from(&settings.storage.data_dir));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let registry = Arc::new(StoreRegistry::new(&data_dir));

    // Open every tracked tenant and bring its analytical store to parity
    // before the query API starts answering.
    for website in &settings.websites {
        let store = registry
            .get_or_open(&website.domain)
            .with_context(|| format!("failed to open stores for {}", website.domain))?;
        let report = backfill::run(&store)
            .with_context(|| format!("backfill failed for {}", website.domain))?;
        if !report.skipped_in_parity {
            tracing::info!(
                domain = %website.domain,
                sessions = report.sessions_migrated,
                events = report.events_migrated,
                "analytical store backfilled"
            );
        }
    }

    let queue = Arc::new(
        EventQueue::open(data_dir.join(&settings.storage.queue_dir))
            .context("failed to open event queue")?,
    );
    let worker = Worker::new(
        Arc::clone(&queue),
        Arc::clone(&registry),
        Sessionizer::default(),
    );
    let worker_handle = worker.spawn();

    let host = args.host.unwrap_or_else(|| settings.server.host.clone());
    let port = args.port.unwrap_or(settings.server.port);

    let server = SitelensServer::new(Arc::clone(&queue), Arc::clone(&registry));
    let (addr, serve_handle) = server
        .listen(&host, port)
        .await
        .context("failed to bind server")?;
    tracing::info!(
        "sitelens listening on http://{addr} ({} sites tracked)",
        settings.websites.len()
    );

    shutdown_signal().await;
    tracing::info!("shutting down");

    // Stop accepting requests first, then drain the queue consumer.
    server.shutdown();
    let _ = serve_handle.await;
    queue.shutdown();
    let _ = tokio::task::spawn_blocking(move || worker_handle.join()).await;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on SIGINT (ctrl-c) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                let _ = signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_default_config_path() {
        let cli = Cli::parse_from(["sitelens"]);
        assert_eq!(cli.config, PathBuf::from("sitelens.json"));
        assert_eq!(cli.host, None);
        assert_eq!(cli.port, None);
    }

    #[test]
    fn cli_overrides() {
        let cli = Cli::parse_from([
            "sitelens",
            "--config",
            "/etc/sitelens.json",
            "--host",
            "127.0.0.1",
            "--port",
            "8099",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/sitelens.json"));
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(8099));
    }
}
