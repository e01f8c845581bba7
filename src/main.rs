//! dav-controller: resets WebDAV test containers on request.
//!
//! This is the application entry point. It loads configuration, initializes
//! tracing, sets up the Axum router and starts the HTTP server.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dav_controller::config::{AppConfig, DEFAULT_LOG_FILTER};
use dav_controller::http::start_server;
use dav_controller::{create_router, AppState};

/// dav-controller: HTTP control surface for resetting test containers
#[derive(Parser, Debug)]
#[command(name = "dav-controller", version, about)]
struct Args {
    /// Path to configuration file (defaults to /etc/dav-controller.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "dav_controller=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration first: it decides the log format
    let config = AppConfig::load_or_default(args.config.as_deref())?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let json = config.logging.is_json();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_filter))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!(
        config = ?args.config,
        init_script = %config.reset.init_script.display(),
        data_root = %config.reset.data_root.display(),
        "Loaded configuration"
    );

    let state = AppState::new(&config);

    for (container, probe) in state.resetter.probes() {
        tracing::info!(
            container,
            addr = %probe.addr(),
            timeout_secs = probe.timeout.as_secs(),
            "Reachability probe configured"
        );
    }

    let app = create_router(state);

    start_server(app, &config.http).await?;

    Ok(())
}
