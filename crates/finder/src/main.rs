//! finder - works out where swadges are at the event.
//!
//! Asks badges to scan on a schedule, submits their Wi-Fi fingerprints to
//! the FIND resolver, and publishes location and occupancy updates. The
//! bus is reached through a JSON-lines bridge on stdin/stdout; logs go to
//! stderr.

mod stdio;

use std::io;

use anyhow::{Context, Result};
use finder_core::{Config, ResolverClient, Tracker};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stdio::StdioBus;

/// Initialize the tracing subscriber for logging.
/// Returns the guard that flushes buffered log lines on drop.
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=finder_core=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the bus, so logs must stay on stderr
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    info!("finder starting");

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        resolver = %config.resolver_url,
        group = %config.resolver_group,
        game = %config.game_id,
        scan_interval_secs = config.scan_interval_secs,
        "Configuration loaded"
    );

    let resolver = ResolverClient::new(config.resolver_url.clone())
        .context("Failed to create resolver client")?;

    let (bus, inbound) = StdioBus::connect();
    let tracker = Tracker::new(config, bus);

    tracker
        .run(resolver, inbound)
        .await
        .context("Lost connection to the bus during startup")?;

    info!("finder shutting down");
    Ok(())
}
