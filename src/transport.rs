//! Transport policy selection for upstream registries
//!
//! This module builds the trust material shared by all secure upstream
//! connections and decides, per registry, whether traffic goes out in
//! plaintext, over verified TLS, or over TLS with verification disabled.
//! The verified client is constructed once and shared by every registry
//! that needs it; skip-verify registries each get a dedicated client so a
//! disabled-verification context is never shared with a verified one.

use reqwest::{Certificate, Client, ClientBuilder};
use url::Url;

use crate::error::TransportError;

/// Operator-supplied certificate authorities, merged with platform roots
///
/// The platform's default roots are always part of the verification set;
/// this bundle only carries the extra PEM certificates from the
/// configuration. Built once at startup, immutable afterwards.
#[derive(Debug, Clone)]
pub struct TrustBundle {
    certificates: Vec<Certificate>,
}

impl TrustBundle {
    /// Parse the extra CA certificates from PEM strings
    pub fn new(extra_ca_certificates: &[String]) -> Result<Self, TransportError> {
        let mut certificates = Vec::with_capacity(extra_ca_certificates.len());
        for pem in extra_ca_certificates {
            let certificate = Certificate::from_pem(pem.as_bytes())
                .map_err(|e| TransportError::InvalidCaCertificate(e.to_string()))?;
            certificates.push(certificate);
        }
        Ok(Self { certificates })
    }

    /// Number of extra certificates in the bundle
    pub fn certificate_count(&self) -> usize {
        self.certificates.len()
    }

    /// Add the bundle's certificates to a client builder
    fn apply(&self, mut builder: ClientBuilder) -> ClientBuilder {
        for certificate in &self.certificates {
            builder = builder.add_root_certificate(certificate.clone());
        }
        builder
    }
}

/// How a route's outbound connection is established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPolicy {
    /// Plain HTTP, no trust material attached
    Plaintext,
    /// TLS with chain and hostname verification against the trust bundle
    VerifiedTls,
    /// TLS with verification disabled, dedicated per-registry context
    UnverifiedTls,
}

/// Transport selector for configured registries
///
/// Owns the shared clients. Verified contexts are interchangeable and
/// side-effect-free to share, so one client serves every verified route;
/// unverified contexts stay per registry.
#[derive(Debug, Clone)]
pub struct Transport {
    trust_bundle: TrustBundle,
    plain: Client,
    verified: Client,
}

impl Transport {
    /// Build the shared clients from the trust bundle
    pub fn new(trust_bundle: TrustBundle) -> Result<Self, TransportError> {
        let plain = base_builder()
            .build()
            .map_err(TransportError::ClientBuild)?;
        let verified = trust_bundle
            .apply(base_builder())
            .build()
            .map_err(TransportError::ClientBuild)?;
        Ok(Self {
            trust_bundle,
            plain,
            verified,
        })
    }

    /// The shared verified-TLS client
    pub fn verified_client(&self) -> Client {
        self.verified.clone()
    }

    /// Select the transport policy and connection agent for one registry
    ///
    /// `http` endpoints are plaintext regardless of `skip_verify`;
    /// `skip_verify` endpoints get a dedicated unverified client; all
    /// other endpoints share the verified client.
    pub fn select(
        &self,
        endpoint: &Url,
        skip_verify: bool,
    ) -> Result<(TransportPolicy, Client), TransportError> {
        if endpoint.scheme() == "http" {
            return Ok((TransportPolicy::Plaintext, self.plain.clone()));
        }
        if skip_verify {
            let client = self
                .trust_bundle
                .apply(base_builder())
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(TransportError::ClientBuild)?;
            return Ok((TransportPolicy::UnverifiedTls, client));
        }
        Ok((TransportPolicy::VerifiedTls, self.verified.clone()))
    }
}

/// Common client settings for every transport
///
/// Redirects are never followed; upstream responses, including redirects
/// to blob storage, pass through to the client unmodified.
fn base_builder() -> ClientBuilder {
    Client::builder().redirect(reqwest::redirect::Policy::none())
}
