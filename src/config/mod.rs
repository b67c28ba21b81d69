//! Configuration management for registry-path-proxy
//!
//! This module handles loading, parsing, and validating application
//! configuration from YAML files. Registry passwords may be supplied as a
//! literal value, a referenced file, or a referenced environment variable;
//! references are resolved exactly once at load time, before the route
//! table is built.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream registry declarations
    #[serde(default)]
    pub registries: Vec<RegistryConfig>,

    /// Default backend policy for unmatched path prefixes
    #[serde(default)]
    pub default_backend: DefaultBackendConfig,

    /// Extra CA certificates (PEM) appended to the platform trust roots
    #[serde(default)]
    pub ca_certificates: Vec<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    ///
    /// Expands `${VAR}` environment references in the raw document, parses
    /// it, resolves registry password references, and validates the result.
    /// Any failure rejects the whole configuration; no partial load.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        let mut config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))?;

        for registry in &mut config.registries {
            registry.resolve_password()?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that serde cannot express
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for registry in &self.registries {
            if !seen.insert(registry.path_prefix.as_str()) {
                return Err(ConfigError::DuplicatePathPrefix(
                    registry.path_prefix.clone(),
                ));
            }
            registry.endpoint_url()?;
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// One upstream registry declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
    /// First path segment that selects this registry
    pub path_prefix: String,

    /// Upstream endpoint, scheme `http` or `https`
    pub endpoint: String,

    /// Disable certificate and hostname verification for this registry
    #[serde(default)]
    pub skip_verify: bool,

    /// Basic-auth username
    #[serde(default)]
    pub username: String,

    /// Basic-auth password (literal source)
    #[serde(default)]
    pub password: String,

    /// Read the password from this file instead of the literal value
    #[serde(default)]
    pub password_ref_file: Option<String>,

    /// Read the password from this environment variable instead of the
    /// literal value; the file reference wins when both are given
    #[serde(default)]
    pub password_ref_env: Option<String>,
}

impl RegistryConfig {
    /// Parse and check the endpoint URI
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::InvalidEndpoint(format!("{}: {}", self.endpoint, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidEndpoint(format!(
                "{}: unsupported scheme {}",
                self.endpoint, other
            ))),
        }
    }

    /// Resolve the effective password from its configured source
    ///
    /// Priority: file reference, then environment-variable reference, then
    /// the literal `password` field. A missing environment variable
    /// resolves to the empty string; an unreadable file fails the load.
    fn resolve_password(&mut self) -> Result<(), ConfigError> {
        if let Some(file) = self.password_ref_file.as_deref().filter(|f| !f.is_empty()) {
            let contents = std::fs::read_to_string(file).map_err(|e| {
                ConfigError::UnreadablePasswordRef {
                    registry: self.path_prefix.clone(),
                    detail: format!("{}: {}", file, e),
                }
            })?;
            self.password = trim_trailing_newline(&contents).to_string();
        } else if let Some(var) = self.password_ref_env.as_deref().filter(|v| !v.is_empty()) {
            self.password = match std::env::var(var) {
                Ok(value) => value,
                Err(std::env::VarError::NotPresent) => String::new(),
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(ConfigError::UnreadablePasswordRef {
                        registry: self.path_prefix.clone(),
                        detail: format!("{}: not valid unicode", var),
                    });
                }
            };
        }
        Ok(())
    }
}

/// Default backend policy for unmatched path prefixes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DefaultBackendConfig {
    /// Disable the pass-through default backend entirely
    #[serde(default)]
    pub disabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Referenced password source could not be read
    #[error("Failed to read password reference for registry {registry}: {detail}")]
    UnreadablePasswordRef { registry: String, detail: String },

    /// Registry endpoint is not a valid http(s) URI
    #[error("Invalid registry endpoint: {0}")]
    InvalidEndpoint(String),

    /// Two registries share the same path prefix
    #[error("Duplicate registry path prefix: {0}")]
    DuplicatePathPrefix(String),
}

/// Strip a single trailing newline from a password file
///
/// Registries compare passwords byte-for-byte; editors routinely append
/// one final `\n` (or `\r\n`), which is removed. All other whitespace is
/// preserved.
fn trim_trailing_newline(contents: &str) -> &str {
    contents
        .strip_suffix("\r\n")
        .or_else(|| contents.strip_suffix('\n'))
        .unwrap_or(contents)
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
