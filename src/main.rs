//! Blob portal entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser ──▶ http (Axum router + middleware)
//!                     │
//!                     ├─▶ web (pages, blob API handlers)
//!                     │        │
//!                     │        ▼
//!                     │   storage (blob REST client, one per process)
//!                     │        │
//!                     │        ▼
//!                     │   identity (az → azd → managed identity chain)
//!                     │
//!     Cross-cutting: config, observability, lifecycle
//! ```
//!
//! Startup order: tracing, config, metrics, signal handling, listeners.
//! The blob client is deliberately absent from this list; it is built by
//! the first request that needs it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use blob_portal::config::load_config;
use blob_portal::http::server::run_redirect;
use blob_portal::http::HttpServer;
use blob_portal::lifecycle::{wait_for_signal, Shutdown};
use blob_portal::observability;

#[derive(Parser, Debug)]
#[command(
    name = "blob-portal",
    about = "Web portal for a blob storage container",
    version
)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "portal.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_tracing();

    let args = Args::parse();
    let config = Arc::new(load_config(&args.config)?);

    tracing::info!(
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        container = %config.storage.container,
        endpoint_configured = config.storage.endpoint.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(e) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let http = reqwest::Client::builder().build()?;
    let server = HttpServer::new(config.clone(), http);

    match &config.listener.tls {
        Some(tls) => {
            let addr: std::net::SocketAddr = config.listener.bind_address.parse()?;

            if let Some(redirect_bind) = &tls.redirect_bind {
                let listener = TcpListener::bind(redirect_bind).await?;
                let redirect_shutdown = shutdown.subscribe();
                let https_port = addr.port();
                tokio::spawn(async move {
                    if let Err(e) = run_redirect(listener, https_port, redirect_shutdown).await {
                        tracing::error!(error = %e, "Redirect listener failed");
                    }
                });
            }

            server.run_tls(addr, tls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
