//! stencil: serves a content site through the dispatch engine.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                       STENCIL                         │
//!   Client Request     │  ┌────────┐   ┌────────────┐   ┌──────────────────┐   │
//!   ───────────────────┼─▶│  http  │──▶│  dispatch  │──▶│ filters / routes │   │
//!                      │  │ server │   │ Dispatcher │   └────────┬─────────┘   │
//!                      │  └────────┘   └─────┬──────┘            ▼             │
//!                      │                     │          ┌──────────────────┐   │
//!                      │                     │          │   controllers    │   │
//!                      │                     │          │ native + scripts │   │
//!                      │                     ▼          └────────┬─────────┘   │
//!   Client Response    │               ┌────────────┐            ▼             │
//!   ◀──────────────────┼───────────────│    view    │◀── repositories + caches │
//!                      │               │  renderers │                          │
//!                      │               └────────────┘                          │
//!                      │  config · lifecycle · observability                   │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use stencil::config::{load_config, Mode, RouteWatcher};
use stencil::lifecycle::signals::spawn_signal_listener;
use stencil::observability::{logging, metrics};
use stencil::{HttpServer, Shutdown, Site};

#[derive(Debug, Parser)]
#[command(name = "stencil", version, about = "Serve a content site")]
struct Cli {
    /// Site configuration file.
    #[arg(short, long, default_value = "stencil.toml")]
    config: PathBuf,

    /// Override the configured run mode.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<Mode>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    match value {
        "development" | "dev" => Ok(Mode::Development),
        "production" | "prod" => Ok(Mode::Production),
        other => Err(format!("unknown mode: {other}")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 1. Configuration
    let mut config = load_config(&cli.config)?;
    if let Some(mode) = cli.mode {
        config.site.mode = mode;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    // 2. Logging and metrics
    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stencil starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        config = %cli.config.display(),
        mode = ?config.site.mode,
        root = %config.site.root.display(),
        bind_address = %config.listener.bind_address,
        "Configuration loaded"
    );

    // 3. Site
    let listener_config = config.listener.clone();
    let mode = config.site.mode;
    let reload_interval = Duration::from_secs(config.site.reload_interval_secs.max(1));
    let site = Arc::new(Site::builder(config).build()?);

    // 4. Route hot reload in development mode
    let _watcher = if mode == Mode::Development && site.routes().source().is_some() {
        match RouteWatcher::new(site.routes().clone(), reload_interval).start() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Route hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    // 5. Serve until signalled
    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());

    let listener = TcpListener::bind(&listener_config.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(site, &listener_config)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
