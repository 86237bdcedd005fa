//! credstub Daemon
//!
//! Fake online-accounts service for integration tests: serves the seeded
//! account roster over a local JSON-RPC socket and pushes change
//! notifications when the test-control operations mutate it.
//!
//! # Running
//!
//! ```bash
//! cargo run -p credstub-daemon
//! # or after install:
//! credstubd
//! ```

use anyhow::Result;
use credstub_daemon::{api, config};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting credstub daemon...");

    let config = config::load_config()?;
    info!("Loaded configuration from {:?}", config.config_path);

    run_daemon(config).await
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_daemon(config: config::DaemonConfig) -> Result<()> {
    info!("Daemon starting on {:?}", config.socket_path);

    let state = if config.seed {
        api::ApiState::new()
    } else {
        api::ApiState::empty()
    };

    let server_handle = api::start_server(&config.socket_path, state).await?;

    info!("Daemon running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping server...");

    server_handle.stop().await?;

    // Clean up socket file
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
        info!("Socket file removed");
    }

    info!("Daemon stopped");
    Ok(())
}
