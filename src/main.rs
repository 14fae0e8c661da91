//! busyness-proxy
//!
//! Reverse proxy whose balancers send each request to the least busy
//! usable worker, with priority tiers, hot standbys and HEAD-probe recovery.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing ──▶ load_balancer::policy
//!                                                      │
//!                                                      ▼
//!                                           load_balancer::selector
//!                                                      │  (errored workers)
//!                                                      ▼
//!                                       health::gate ──▶ health::probe (HEAD)
//!                                                      │
//!     Client Response                                  ▼
//!     ◀────────────── http::server ◀──────────────── worker
//!
//!     config (TOML, hot reload) · observability (tracing, prometheus)
//!     admin API · lifecycle (signals, shutdown)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use busyness_proxy::admin;
use busyness_proxy::config::loader::load_config;
use busyness_proxy::config::watcher::ConfigWatcher;
use busyness_proxy::http::HttpServer;
use busyness_proxy::lifecycle::{signals, Shutdown};
use busyness_proxy::observability::{logging, metrics};
use busyness_proxy::ProxyConfig;

#[derive(Parser, Debug)]
#[command(name = "busyness-proxy", version, about = "Reverse proxy with a tiered least-busy balancer")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not reload the configuration when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "busyness-proxy starting");
    if args.config.is_none() {
        tracing::warn!("No configuration file given, running with defaults (no balancers)");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        balancers = config.balancers.len(),
        routes = config.routes.len(),
        probe_mode = ?config.probe.mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    // The watcher must stay alive for reloads to keep coming.
    let (_watcher, config_updates) = match (&args.config, args.no_watch) {
        (Some(path), false) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config.clone());

    let admin_task = if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        Some(tokio::spawn(admin::run_admin(
            server.state(),
            admin_listener,
            shutdown.subscribe(),
        )))
    } else {
        None
    };

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    if let Some(task) = admin_task {
        if let Ok(Err(e)) = task.await {
            tracing::error!(error = %e, "Admin API failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
