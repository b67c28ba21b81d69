//! registry-path-proxy - A path-prefix reverse proxy for Docker registries
//!
//! This is the main entry point for the registry-path-proxy application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use registry_path_proxy::config::Config;
use registry_path_proxy::proxy::PathProxy;
use registry_path_proxy::server::{AppState, Server};

/// registry-path-proxy - A path-prefix reverse proxy for Docker registries
#[derive(Parser, Debug)]
#[command(name = "registry-path-proxy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "REGISTRY_PATH_PROXY_CONFIG")]
    config: String,

    /// Override the listen port from the configuration
    #[arg(short, long, env = "REGISTRY_PATH_PROXY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging.level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        registries = config.registries.len(),
        default_backend_disabled = config.default_backend.disabled,
        "Starting registry-path-proxy"
    );

    let proxy = PathProxy::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to build proxy core: {}", e))?;

    for registry in &config.registries {
        info!(
            path_prefix = %registry.path_prefix,
            endpoint = %registry.endpoint,
            skip_verify = registry.skip_verify,
            authenticated = !registry.username.is_empty() || !registry.password.is_empty(),
            "Registry route configured"
        );
    }

    let state = AppState {
        proxy: Arc::new(proxy),
    };

    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;

    info!("registry-path-proxy shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber from the configured log level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
