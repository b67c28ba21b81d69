//! Route table for registry-path-proxy
//!
//! Static routes are built once at startup, one per configured registry.
//! Default-backend routes are synthesized lazily for unmatched path
//! segments and memoized for the process lifetime, so the reqwest client
//! behind a synthesized route keeps its connection pool across requests.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::RwLock;
use url::Url;

use crate::config::Config;
use crate::error::ProxyError;
use crate::transport::{Transport, TransportPolicy};

/// A resolved, ready-to-use binding from path prefix to upstream
#[derive(Debug)]
pub struct Route {
    /// Configured path prefix, or the synthesized host for default backends
    pub path_prefix: String,

    /// Upstream endpoint
    pub endpoint: Url,

    /// Transport policy chosen at construction time
    pub policy: TransportPolicy,

    /// Basic-auth username, empty when unauthenticated
    pub username: String,

    /// Basic-auth password, empty when unauthenticated
    pub password: String,

    /// Connection agent for this route
    pub client: Client,
}

/// Process-wide route state
///
/// The static set is write-once; the default-backend set grows
/// monotonically under an exclusive check-then-insert, so concurrent
/// first requests for the same segment still produce exactly one Route.
pub struct RouteTable {
    static_routes: HashMap<String, Arc<Route>>,
    default_backends: RwLock<HashMap<String, Arc<Route>>>,
    default_backend_disabled: bool,
    verified_client: Client,
}

impl RouteTable {
    /// Build the static route set from configuration
    pub fn new(config: &Config, transport: &Transport) -> Result<Self, ProxyError> {
        let mut static_routes = HashMap::with_capacity(config.registries.len());
        for registry in &config.registries {
            let endpoint = registry.endpoint_url()?;
            let (policy, client) = transport.select(&endpoint, registry.skip_verify)?;
            let route = Arc::new(Route {
                path_prefix: registry.path_prefix.clone(),
                endpoint,
                policy,
                username: registry.username.clone(),
                password: registry.password.clone(),
                client,
            });
            static_routes.insert(registry.path_prefix.clone(), route);
        }

        Ok(Self {
            static_routes,
            default_backends: RwLock::new(HashMap::new()),
            default_backend_disabled: config.default_backend.disabled,
            verified_client: transport.verified_client(),
        })
    }

    /// Exact-match lookup against the static route set
    pub fn resolve(&self, path_prefix: &str) -> Option<Arc<Route>> {
        self.static_routes.get(path_prefix).cloned()
    }

    /// Resolve an unmatched segment through the default backend
    ///
    /// Returns the memoized Route when one exists for this segment;
    /// otherwise synthesizes a route to `https://<segment>/v2/` over the
    /// shared verified transport. Default backends never skip
    /// verification. Returns None when the feature is disabled or the
    /// segment does not form a usable https URL.
    pub async fn resolve_default(&self, segment: &str) -> Option<Arc<Route>> {
        if self.default_backend_disabled || segment.is_empty() {
            return None;
        }

        {
            let backends = self.default_backends.read().await;
            if let Some(route) = backends.get(segment) {
                return Some(Arc::clone(route));
            }
        }

        let mut backends = self.default_backends.write().await;
        // Re-check under the write lock; a concurrent request may have
        // synthesized this segment between the two acquisitions.
        if let Some(route) = backends.get(segment) {
            return Some(Arc::clone(route));
        }

        let endpoint = Url::parse(&format!("https://{}/v2/", segment)).ok()?;
        if endpoint.host_str().is_none() {
            return None;
        }

        let route = Arc::new(Route {
            path_prefix: segment.to_string(),
            endpoint,
            policy: TransportPolicy::VerifiedTls,
            username: String::new(),
            password: String::new(),
            client: self.verified_client.clone(),
        });
        backends.insert(segment.to_string(), Arc::clone(&route));
        Some(route)
    }

    /// Number of configured static routes
    pub fn static_route_count(&self) -> usize {
        self.static_routes.len()
    }

    /// Number of memoized default-backend routes
    pub async fn default_backend_count(&self) -> usize {
        self.default_backends.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefaultBackendConfig, RegistryConfig};
    use crate::transport::TrustBundle;

    fn registry(path_prefix: &str, endpoint: &str) -> RegistryConfig {
        RegistryConfig {
            path_prefix: path_prefix.to_string(),
            endpoint: endpoint.to_string(),
            skip_verify: false,
            username: String::new(),
            password: String::new(),
            password_ref_file: None,
            password_ref_env: None,
        }
    }

    fn route_table(registries: Vec<RegistryConfig>, default_disabled: bool) -> RouteTable {
        let config = Config {
            registries,
            default_backend: DefaultBackendConfig {
                disabled: default_disabled,
            },
            ..Default::default()
        };
        let transport = Transport::new(TrustBundle::new(&[]).unwrap()).unwrap();
        RouteTable::new(&config, &transport).unwrap()
    }

    // Test 1: Static routes resolve by exact prefix with config values
    #[test]
    fn test_static_route_resolution() {
        let mut hub = registry("docker-hub", "https://registry-1.docker.io");
        hub.username = "bot".to_string();
        hub.password = "hunter2".to_string();
        let table = route_table(vec![hub, registry("quay", "http://quay.local:5000")], false);

        assert_eq!(table.static_route_count(), 2);

        let route = table.resolve("docker-hub").unwrap();
        assert_eq!(route.endpoint.as_str(), "https://registry-1.docker.io/");
        assert_eq!(route.policy, TransportPolicy::VerifiedTls);
        assert_eq!(route.username, "bot");
        assert_eq!(route.password, "hunter2");

        let route = table.resolve("quay").unwrap();
        assert_eq!(route.policy, TransportPolicy::Plaintext);
    }

    // Test 2: Lookup is exact; no prefix or substring matching
    #[test]
    fn test_static_route_exact_match_only() {
        let table = route_table(vec![registry("docker-hub", "https://registry-1.docker.io")], false);

        assert!(table.resolve("docker").is_none());
        assert!(table.resolve("docker-hub2").is_none());
        assert!(table.resolve("DOCKER-HUB").is_none());
    }

    // Test 3: skip_verify registries get their own unverified policy
    #[test]
    fn test_skip_verify_registry_policy() {
        let mut internal = registry("internal", "https://registry.internal");
        internal.skip_verify = true;
        let table = route_table(
            vec![internal, registry("hub", "https://registry-1.docker.io")],
            false,
        );

        assert_eq!(
            table.resolve("internal").unwrap().policy,
            TransportPolicy::UnverifiedTls
        );
        assert_eq!(
            table.resolve("hub").unwrap().policy,
            TransportPolicy::VerifiedTls
        );
    }

    // Test 4: Default backend synthesizes https://<segment>/v2/
    #[tokio::test]
    async fn test_default_backend_synthesis() {
        let table = route_table(vec![], false);

        let route = table.resolve_default("quay.io").await.unwrap();
        assert_eq!(route.endpoint.as_str(), "https://quay.io/v2/");
        assert_eq!(route.policy, TransportPolicy::VerifiedTls);
        assert_eq!(route.username, "");
        assert_eq!(route.password, "");
    }

    // Test 5: Default backend routes are memoized per segment
    #[tokio::test]
    async fn test_default_backend_memoization() {
        let table = route_table(vec![], false);

        let first = table.resolve_default("quay.io").await.unwrap();
        let second = table.resolve_default("quay.io").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.default_backend_count().await, 1);

        let other = table.resolve_default("ghcr.io").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(table.default_backend_count().await, 2);
    }

    // Test 6: Disabled default backend always returns None
    #[tokio::test]
    async fn test_default_backend_disabled() {
        let table = route_table(vec![], true);

        assert!(table.resolve_default("quay.io").await.is_none());
        assert!(table.resolve_default("quay.io").await.is_none());
        assert_eq!(table.default_backend_count().await, 0);
    }

    // Test 7: Empty or unusable segments resolve to None
    #[tokio::test]
    async fn test_default_backend_rejects_unusable_segments() {
        let table = route_table(vec![], false);

        assert!(table.resolve_default("").await.is_none());
        assert!(table.resolve_default("bad segment").await.is_none());
        assert_eq!(table.default_backend_count().await, 0);
    }

    // Test 8: Concurrent first access synthesizes exactly one route
    #[tokio::test]
    async fn test_default_backend_concurrent_synthesis() {
        let table = Arc::new(route_table(vec![], false));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = Arc::clone(&table);
            handles.push(tokio::spawn(async move {
                table.resolve_default("quay.io").await.unwrap()
            }));
        }

        let mut routes = Vec::new();
        for handle in handles {
            routes.push(handle.await.unwrap());
        }

        for route in &routes[1..] {
            assert!(Arc::ptr_eq(&routes[0], route));
        }
        assert_eq!(table.default_backend_count().await, 1);
    }
}
