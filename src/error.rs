//! Application error types for registry-path-proxy
//!
//! This module defines the error types shared across the proxy core.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::config::ConfigError;

/// Transport construction errors
///
/// All variants are fatal at startup; the process must not begin
/// listening with a broken trust bundle or HTTP client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An operator-supplied CA certificate did not parse as PEM
    #[error("Invalid CA certificate: {0}")]
    InvalidCaCertificate(String),

    /// The underlying HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Proxy-related errors
///
/// Routing misses and legacy-client rejections are not errors; they are
/// terminal 404 outcomes handled by the router. This type covers startup
/// failures and upstream transport failures after a route was resolved.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport construction error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Upstream request failed
    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
