//! HTTP middleware for registry-path-proxy
//!
//! Provides the access-log middleware that records one structured line
//! per request, shaped for operational parity with the usual registry
//! proxy access logs.

use axum::extract::{ConnectInfo, Request};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

/// Access-log middleware function
///
/// Emits one event per completed request with method, path, status,
/// content length, user agent, and client IP; the subscriber supplies
/// the timestamp.
pub async fn access_log_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let response = next.run(request).await;

    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        content_length = %content_length,
        user_agent = %user_agent,
        client_ip = %addr.ip(),
        "Request completed"
    );

    response
}
