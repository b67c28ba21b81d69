//! registry-path-proxy - A path-prefix reverse proxy for Docker registries
//!
//! This crate provides a proxy server that maps the first segment of an
//! inbound `/v2/` path to a configured upstream registry, selects the
//! transport security policy for that upstream, and injects basic-auth
//! credentials before forwarding. Unmatched segments can be treated as
//! literal registry hostnames through a memoized default backend.

pub mod config;
pub mod error;
pub mod proxy;
pub mod server;
pub mod transport;
