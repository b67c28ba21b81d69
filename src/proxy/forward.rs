//! Request forwarding for registry-path-proxy
//!
//! Thin wrapper around the resolved route's reqwest client. Rewrites the
//! target URL, strips hop-by-hop headers, injects basic-auth credentials,
//! and streams the request and response bodies without buffering.

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{HeaderName, HeaderValue, AUTHORIZATION, HOST};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::error::ProxyError;
use crate::proxy::route::Route;

/// Headers that describe the inbound hop and must not be forwarded
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forward a routed request upstream and stream the response back
///
/// The upstream URL is the route's endpoint with `rewritten_path` as the
/// effective path; the inbound query string is preserved. The `Host`
/// header is dropped so the client derives it from the target. Upstream
/// responses, including error statuses and redirects, pass through
/// unmodified.
pub async fn forward(
    route: &Route,
    rewritten_path: &str,
    request: Request,
) -> Result<Response, ProxyError> {
    let mut target = route.endpoint.clone();
    target.set_path(rewritten_path);
    target.set_query(request.uri().query());

    let method = request.method().clone();
    let headers = outbound_headers(request.headers(), route);

    let mut builder = route
        .client
        .request(method.clone(), target)
        .headers(headers);
    if method != Method::GET && method != Method::HEAD {
        let body = reqwest::Body::wrap_stream(request.into_body().into_data_stream());
        builder = builder.body(body);
    }

    let upstream = builder.send().await?;

    let mut response = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers() {
        if is_hop_by_hop(name) {
            continue;
        }
        response = response.header(name, value);
    }
    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ProxyError::Internal(e.to_string()))
}

/// Copy inbound headers, dropping hop-by-hop headers and `Host`, and
/// apply the route's credentials
fn outbound_headers(inbound: &HeaderMap, route: &Route) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop(name) || *name == HOST {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(authorization) = basic_authorization(&route.username, &route.password) {
        headers.insert(AUTHORIZATION, authorization);
    }

    headers
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Build the basic-auth header for a registry's credentials
///
/// The username is percent-encoded, the password is used raw, and the
/// pair is base64-encoded under the `basic` scheme. Returns None when
/// both are empty; the client's own authorization header then passes
/// through untouched.
pub fn basic_authorization(username: &str, password: &str) -> Option<HeaderValue> {
    if username.is_empty() && password.is_empty() {
        return None;
    }
    let credentials = format!("{}:{}", percent_encode_component(username), password);
    let encoded = BASE64_STANDARD.encode(credentials);
    HeaderValue::from_str(&format!("basic {}", encoded)).ok()
}

/// Percent-encode a URI component, leaving `encodeURIComponent`'s
/// unreserved set untouched
fn percent_encode_component(input: &str) -> String {
    const UNRESERVED_MARKS: &[u8] = b"-_.!~*'()";
    let mut out = String::with_capacity(input.len());
    for &byte in input.as_bytes() {
        if byte.is_ascii_alphanumeric() || UNRESERVED_MARKS.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Credentials produce the basic scheme with base64 payload
    #[test]
    fn test_basic_authorization_encoding() {
        let value = basic_authorization("u", "p").unwrap();
        assert_eq!(value.to_str().unwrap(), format!("basic {}", BASE64_STANDARD.encode("u:p")));
    }

    // Test 2: Empty credentials set no header
    #[test]
    fn test_basic_authorization_empty() {
        assert!(basic_authorization("", "").is_none());
    }

    // Test 3: Username alone is enough to set the header
    #[test]
    fn test_basic_authorization_username_only() {
        let value = basic_authorization("bot", "").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            format!("basic {}", BASE64_STANDARD.encode("bot:"))
        );
    }

    // Test 4: Username is percent-encoded, password stays raw
    #[test]
    fn test_basic_authorization_username_encoding() {
        let value = basic_authorization("user@corp", "p:ss@word").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            format!("basic {}", BASE64_STANDARD.encode("user%40corp:p:ss@word"))
        );
    }

    // Test 5: Percent encoding matches the encodeURIComponent character set
    #[test]
    fn test_percent_encode_component() {
        assert_eq!(percent_encode_component("plain-user_1"), "plain-user_1");
        assert_eq!(percent_encode_component("a.b!c~d*e'f(g)"), "a.b!c~d*e'f(g)");
        assert_eq!(percent_encode_component("a b/c"), "a%20b%2Fc");
        assert_eq!(percent_encode_component("ü"), "%C3%BC");
    }

    // Test 6: Hop-by-hop headers are recognized case-insensitively
    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop(&HeaderName::from_static("connection")));
        assert!(is_hop_by_hop(&HeaderName::from_static("transfer-encoding")));
        assert!(!is_hop_by_hop(&HeaderName::from_static("content-length")));
        assert!(!is_hop_by_hop(&HeaderName::from_static("authorization")));
    }
}
