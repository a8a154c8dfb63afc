use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Global configuration for the dashboard
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Management server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Code store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Container runtime configuration
    #[serde(default)]
    pub docker: DockerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address for the management API (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Port for the management API (default: 8000)
    #[serde(default = "default_listen_port")]
    pub port: u16,

    /// Default number of log lines returned when the request does not
    /// specify one (default: 100)
    #[serde(default = "default_log_tail")]
    pub default_log_tail: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Root directory holding one subdirectory per app (default: /apps-code)
    #[serde(default = "default_code_root")]
    pub code_root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DockerConfig {
    /// Docker host override, e.g. "unix:///var/run/docker.sock" or
    /// "tcp://localhost:2375". Falls back to DOCKER_HOST, then to the
    /// platform socket defaults.
    pub docker_host: Option<String>,

    /// Docker network apps and the reverse proxy share (default: paw-web-network)
    #[serde(default = "default_network")]
    pub network: String,

    /// Base image apps run from (default: python:3.10-slim)
    #[serde(default = "default_image")]
    pub image: String,

    /// Port the app server binds inside the container and the proxy
    /// forwards to (default: 5000)
    #[serde(default = "default_app_port")]
    pub app_port: u16,

    /// Base domain apps are routed under, e.g. "apps.example.com".
    /// Defaults to $BASE_DOMAIN, then "localhost".
    #[serde(default = "default_base_domain")]
    pub base_domain: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8000
}

fn default_log_tail() -> usize {
    100
}

fn default_code_root() -> String {
    "/apps-code".to_string()
}

fn default_network() -> String {
    "paw-web-network".to_string()
}

fn default_image() -> String {
    "python:3.10-slim".to_string()
}

fn default_app_port() -> u16 {
    5000
}

fn default_base_domain() -> String {
    std::env::var("BASE_DOMAIN").unwrap_or_else(|_| "localhost".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_listen_port(),
            default_log_tail: default_log_tail(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            code_root: default_code_root(),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            docker_host: None,
            network: default_network(),
            image: default_image(),
            app_port: default_app_port(),
            base_domain: default_base_domain(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{}:{}': {}", self.bind, self.port, e))
    }
}

impl Config {
    /// Load configuration from a TOML file. A missing file is not an
    /// error: the dashboard runs entirely on defaults in that case.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
