//! HTTP router for registry-path-proxy
//!
//! This module defines the axum router that handles all HTTP requests:
//! - A health check endpoint
//! - The wildcard `/v2/` entry point that feeds the proxy core

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::proxy::{forward, PathProxy, RouteDecision};
use crate::server::middleware::access_log_middleware;

/// Shared application state
pub struct AppState {
    /// The proxy core
    pub proxy: Arc<PathProxy>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            proxy: Arc::clone(&self.proxy),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the main application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Registry proxy entry point; any method, any sub-path
        .route("/v2/", any(proxy_handler))
        .route("/v2/*path", any(proxy_handler))
        .layer(axum::middleware::from_fn(access_log_middleware))
        .with_state(state)
}

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Registry proxy handler
///
/// Strips the `/v2/` entry point, routes the remainder, and either
/// forwards to the resolved upstream or answers with a terminal 404
/// with an empty body.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let sub_path = request
        .uri()
        .path()
        .strip_prefix("/v2/")
        .unwrap_or_default()
        .to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    match state.proxy.route(&sub_path, &user_agent).await {
        RouteDecision::Forward {
            route,
            rewritten_path,
        } => match forward(&route, &rewritten_path, request).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    registry = %route.path_prefix,
                    error = %e,
                    "Upstream request failed"
                );
                StatusCode::BAD_GATEWAY.into_response()
            }
        },
        RouteDecision::LegacyClientRejected => {
            debug!(user_agent = %user_agent, "Rejected legacy client");
            StatusCode::NOT_FOUND.into_response()
        }
        RouteDecision::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}
