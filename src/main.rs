//! Caching forward proxy.
//!
//! ```text
//!   client ──▶ net::listener ──▶ http::server ──┬─ CONNECT ─▶ proxy::tunnel ⇄ remote
//!              (admission)       (classify)     └─ GET ─▶ cache ─ miss ─▶ proxy::forward ─▶ origin
//! ```
//!
//! Usage: `caching-proxy [PORT]` (default 8080).

use std::time::Duration;

use clap::Parser;

use caching_proxy::config::constants::DEFAULT_PORT;
use caching_proxy::config::loader::ConfigError;
use caching_proxy::config::validation::validate_config;
use caching_proxy::lifecycle::signals::shutdown_on_ctrl_c;
use caching_proxy::net::Listener;
use caching_proxy::observability::logging::init_tracing;
use caching_proxy::{ProxyConfig, ProxyServer, Shutdown};

/// Longest wait for in-flight connections after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "caching-proxy", version, about = "Caching forward HTTP proxy")]
struct Cli {
    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ProxyConfig::with_port(cli.port);

    init_tracing(&config.observability);
    tracing::info!("caching-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    validate_config(&config).map_err(ConfigError::Validation)?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        cache_max_size = config.cache.max_size,
        cache_max_element_size = config.cache.max_element_size,
        "Configuration loaded"
    );

    let listener = Listener::bind(&config.listener).await?;
    let server = ProxyServer::new(&config);
    let tracker = server.tracker().clone();

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move { shutdown_on_ctrl_c(&shutdown).await });

    server.run(listener, signal).await?;

    if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            active_connections = tracker.active_count(),
            "Drain timeout elapsed, exiting with connections open"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
