use crate::error::{FetchError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Environment variable prefix, e.g. `FETCHGATE__UPSTREAM__BASE_URL`
pub const ENV_PREFIX: &str = "FETCHGATE";

/// Routes the server mounts itself
const RESERVED_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Main fetchgate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream API the dispatcher talks to
    pub upstream: UpstreamConfig,
    /// Proxy endpoint configuration
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Absolute base URL; request paths are appended verbatim
    pub base_url: String,
    /// Name of the cookie holding the bearer token
    #[serde(default = "default_token_cookie")]
    pub token_cookie: String,
    /// Fall back to an incoming `Authorization: Bearer` header when the cookie is absent
    #[serde(default)]
    pub accept_bearer_header: bool,
}

/// Proxy endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Path the proxy endpoint is mounted on
    #[serde(default = "default_proxy_path")]
    pub path: String,
    /// Respond with the upstream status code instead of a fixed 500
    #[serde(default)]
    pub pass_through_status: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

fn default_token_cookie() -> String {
    "token".to_string()
}

fn default_proxy_path() -> String {
    "/api/proxy".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            path: default_proxy_path(),
            pass_through_status: false,
        }
    }
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token_cookie: default_token_cookie(),
            accept_bearer_header: false,
        }
    }

    /// Validate the upstream section
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Config(format!("Invalid upstream base_url: {}", e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::Config(
                "Upstream base_url must start with http:// or https://".to_string(),
            ));
        }

        if self.token_cookie.is_empty() {
            return Err(FetchError::Config(
                "Upstream token_cookie cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| FetchError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from an optional YAML file overlaid with `FETCHGATE__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| FetchError::Config(format!("Failed to load config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.upstream.validate()?;

        if !self.proxy.path.starts_with('/') {
            return Err(FetchError::Config(format!(
                "Proxy path must start with '/': {}",
                self.proxy.path
            )));
        }

        if RESERVED_PATHS.contains(&self.proxy.path.as_str()) {
            return Err(FetchError::Config(format!(
                "Proxy path collides with a built-in route: {}",
                self.proxy.path
            )));
        }

        if self.server.timeout_secs == 0 {
            return Err(FetchError::Config(
                "Server timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a configuration pointing at the given upstream, for testing
    pub fn for_upstream(base_url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::new(base_url),
            proxy: ProxyConfig::default(),
        }
    }
}
