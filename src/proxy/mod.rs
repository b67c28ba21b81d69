//! Path-prefix routing core for registry-path-proxy
//!
//! This module owns the per-request decision logic:
//! - legacy Docker client rejection
//! - splitting the inbound sub-path into routing prefix and upstream path
//! - static route lookup with default-backend fallback
//!
//! The HTTP server hands each `/v2/` request here and either forwards the
//! resolved route or answers with a terminal 404.

pub mod forward;
pub mod route;

pub use forward::{basic_authorization, forward};
pub use route::{Route, RouteTable};

use std::sync::Arc;

use regex_lite::Regex;
use tracing::warn;

use crate::config::Config;
use crate::error::ProxyError;
use crate::transport::{Transport, TrustBundle};

/// Outcome of routing one inbound request
#[derive(Debug)]
pub enum RouteDecision {
    /// Forward to the resolved route with the rewritten upstream path
    Forward {
        route: Arc<Route>,
        rewritten_path: String,
    },
    /// The client is a disallowed legacy Docker version; terminal 404
    LegacyClientRejected,
    /// No static route and no default backend matched; terminal 404
    NotFound,
}

/// The path-prefix proxy core
///
/// Built once at startup from validated configuration; immutable apart
/// from the route table's default-backend memoization.
pub struct PathProxy {
    routes: RouteTable,
    legacy_clients: Regex,
    legacy_dev_builds: Regex,
}

impl PathProxy {
    /// Build the trust bundle, transport clients, and route table
    pub fn new(config: &Config) -> Result<Self, ProxyError> {
        let trust_bundle = TrustBundle::new(&config.ca_certificates)?;
        let transport = Transport::new(trust_bundle)?;
        let routes = RouteTable::new(config, &transport)?;

        // Docker 1.5 and earlier are not allowed to connect; pre-1.6.0
        // daemons did not set a proper user agent on ping and show up as
        // bare "Go " clients. 1.5 development builds are exempt.
        let legacy_clients = Regex::new(r"^(docker/1\.(3|4|5)|Go )")
            .expect("Invalid regex pattern for legacy client detection");
        let legacy_dev_builds = Regex::new(r"^docker/1\.5\.[0-9]-dev")
            .expect("Invalid regex pattern for legacy dev build exemption");

        Ok(Self {
            routes,
            legacy_clients,
            legacy_dev_builds,
        })
    }

    /// Route one inbound request
    ///
    /// `sub_path` is everything after the `/v2/` entry point; `user_agent`
    /// is the inbound header value, empty when absent.
    pub async fn route(&self, sub_path: &str, user_agent: &str) -> RouteDecision {
        if self.is_legacy_client(user_agent) {
            return RouteDecision::LegacyClientRejected;
        }

        let (path_prefix, rewritten_path) = split_sub_path(sub_path);

        if let Some(route) = self.routes.resolve(path_prefix) {
            return RouteDecision::Forward {
                route,
                rewritten_path,
            };
        }

        if let Some(route) = self.routes.resolve_default(path_prefix).await {
            return RouteDecision::Forward {
                route,
                rewritten_path,
            };
        }

        warn!(registry = %path_prefix, "Cannot find registry");
        RouteDecision::NotFound
    }

    /// Whether the user agent identifies a disallowed legacy client
    pub fn is_legacy_client(&self, user_agent: &str) -> bool {
        self.legacy_clients.is_match(user_agent) && !self.legacy_dev_builds.is_match(user_agent)
    }

    /// Access to the route table, mainly for tests and startup logging
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

/// Split an inbound sub-path into routing prefix and rewritten path
///
/// The first non-empty segment is the routing key; the remainder,
/// rejoined behind a leading slash, is what the upstream must serve.
fn split_sub_path(sub_path: &str) -> (&str, String) {
    let trimmed = sub_path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((prefix, rest)) => (prefix, format!("/{}", rest)),
        None => (trimmed, "/".to_string()),
    }
}
