//! Server configuration loading and validation.
//!
//! Settings come from an optional TOML file; every field has a default, so
//! an empty file (or none at all) yields a working local setup. Command
//! line flags are applied on top by the CLI.
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//! gateway = "127.0.0.1:8081"
//! dial_timeout_secs = 10
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//!
//! [cluster]
//! node_count = 5
//! health_timeout_secs = 120
//! base_http_port = 9650
//! restart_policy = "node"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::Span;

use super::logging::LoggingConfig;
use crate::application::orchestration::builder::{DEFAULT_BASE_HTTP_PORT, DEFAULT_NODE_COUNT};
use crate::application::orchestration::{OrchestratorOptions, RestartPolicy, DEFAULT_HEALTH_TIMEOUT};
use crate::error::{ConfigError, Result};

/// Control server listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket control-plane address.
    pub listen: String,
    /// HTTP bridge address.
    pub gateway: String,
    /// Dial timeout handed to clients built from this config.
    pub dial_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            gateway: "127.0.0.1:8081".to_string(),
            dial_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr("server.listen", &self.listen)
    }

    pub fn gateway_addr(&self) -> Result<SocketAddr> {
        parse_addr("server.gateway", &self.gateway)
    }

    #[must_use]
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }
}

/// Cluster shape and timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub node_count: usize,
    pub health_timeout_secs: u64,
    pub base_http_port: u16,
    /// Root data directory. A fresh temp directory per cluster when unset.
    pub root_dir: Option<PathBuf>,
    pub restart_policy: RestartPolicy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_count: DEFAULT_NODE_COUNT,
            health_timeout_secs: DEFAULT_HEALTH_TIMEOUT.as_secs(),
            base_http_port: DEFAULT_BASE_HTTP_PORT,
            root_dir: None,
            restart_policy: RestartPolicy::default(),
        }
    }
}

/// Main server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cluster: ClusterConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.server.listen_addr()?;
        self.server.gateway_addr()?;
        if self.server.dial_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.dial_timeout_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.cluster.node_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cluster.node_count",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.cluster.health_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cluster.health_timeout_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        self.logging.validate()?;
        Ok(())
    }

    /// Orchestrator options for clusters started by this server.
    #[must_use]
    pub fn orchestrator_options(&self, span: Span) -> OrchestratorOptions {
        OrchestratorOptions {
            node_count: self.cluster.node_count,
            base_http_port: self.cluster.base_http_port,
            health_timeout: Duration::from_secs(self.cluster.health_timeout_secs),
            restart_policy: self.cluster.restart_policy,
            root_dir: self.cluster.root_dir.clone(),
            span,
        }
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr> {
    let addr = value
        .parse::<SocketAddr>()
        .map_err(|err| ConfigError::InvalidValue {
            field,
            reason: format!("{value:?}: {err}"),
        })?;
    Ok(addr)
}
