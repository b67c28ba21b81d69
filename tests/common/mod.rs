//! Shared helpers for integration tests

use std::net::SocketAddr;
use std::sync::Arc;

use registry_path_proxy::config::Config;
use registry_path_proxy::proxy::PathProxy;
use registry_path_proxy::server::{build_router, AppState};

/// Spawn the full proxy application on an ephemeral port
pub async fn spawn_proxy(config: Config) -> SocketAddr {
    let state = AppState {
        proxy: Arc::new(PathProxy::new(&config).expect("proxy core should build")),
    };
    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port should bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server runs");
    });

    addr
}

/// Configuration with one registry routed at the given prefix
pub fn single_registry_config(path_prefix: &str, endpoint: &str) -> Config {
    config_from_yaml(&format!(
        r#"
registries:
  - path_prefix: "{}"
    endpoint: "{}"
"#,
        path_prefix, endpoint
    ))
}

/// Parse a YAML document into a validated Config
pub fn config_from_yaml(yaml: &str) -> Config {
    Config::from_yaml(yaml).expect("test config should parse")
}
