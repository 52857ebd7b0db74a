//! Per-node configuration generation.
//!
//! Pure path and payload construction. Nothing here touches the
//! filesystem.

use std::path::{Path, PathBuf};

use serde_json::json;

use crate::domain::NodeConfig;
use crate::error::{ConfigError, Result};
use crate::port::inbound::control::StartParams;

/// Node count used when none is configured.
pub const DEFAULT_NODE_COUNT: usize = 5;

/// First node's HTTP port. Node `i` gets `base + 2i` and `base + 2i + 1`.
pub const DEFAULT_BASE_HTTP_PORT: u16 = 9650;

const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Builds one [`NodeConfig`] per planned node.
#[derive(Debug, Clone)]
pub struct NodeConfigBuilder {
    exec_path: PathBuf,
    root_dir: PathBuf,
    whitelisted_subnets: String,
    log_level: String,
    node_count: usize,
    base_http_port: u16,
}

impl NodeConfigBuilder {
    /// Start a builder for nodes running `exec_path` under `root_dir`.
    pub fn new(exec_path: impl Into<PathBuf>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            exec_path: exec_path.into(),
            root_dir: root_dir.into(),
            whitelisted_subnets: String::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            node_count: DEFAULT_NODE_COUNT,
            base_http_port: DEFAULT_BASE_HTTP_PORT,
        }
    }

    /// Builder seeded from start parameters.
    pub fn from_params(params: &StartParams, root_dir: impl Into<PathBuf>) -> Self {
        Self::new(params.exec_path.clone(), root_dir)
            .with_whitelisted_subnets(params.whitelisted_subnets.clone())
            .with_log_level(params.log_level.as_deref().unwrap_or_default())
    }

    #[must_use]
    pub fn with_whitelisted_subnets(mut self, subnets: impl Into<String>) -> Self {
        self.whitelisted_subnets = subnets.into();
        self
    }

    /// Set the node log level. Empty means `INFO`.
    #[must_use]
    pub fn with_log_level(mut self, level: &str) -> Self {
        self.log_level = normalize_log_level(level);
        self
    }

    #[must_use]
    pub fn with_node_count(mut self, count: usize) -> Self {
        self.node_count = count;
        self
    }

    #[must_use]
    pub fn with_base_http_port(mut self, port: u16) -> Self {
        self.base_http_port = port;
        self
    }

    /// Name of the node at `index` (zero-based).
    #[must_use]
    pub fn node_name(index: usize) -> String {
        format!("node{}", index + 1)
    }

    /// Generate every node's config in launch order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the executable path is empty, no nodes
    /// are planned, or the port range overflows.
    pub fn build(&self) -> Result<Vec<NodeConfig>> {
        if self.exec_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField { field: "exec_path" }.into());
        }
        if self.node_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "node_count",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        (0..self.node_count).map(|i| self.build_node(i)).collect()
    }

    fn build_node(&self, index: usize) -> Result<NodeConfig> {
        let name = Self::node_name(index);
        let (http_port, staking_port) = self.ports_for(index)?;
        let log_dir = self.root_dir.join(&name).join("log");
        let db_dir = self.root_dir.join(&name).join("db-dir");

        let payload = render_payload(&PayloadFields {
            log_level: &self.log_level,
            log_dir: &log_dir,
            db_dir: &db_dir,
            whitelisted_subnets: &self.whitelisted_subnets,
            http_port,
            staking_port,
        })?;

        Ok(NodeConfig {
            name,
            exec_path: self.exec_path.clone(),
            log_dir,
            db_dir,
            whitelisted_subnets: self.whitelisted_subnets.clone(),
            http_port,
            staking_port,
            payload,
        })
    }

    fn ports_for(&self, index: usize) -> Result<(u16, u16)> {
        let offset = u16::try_from(index * 2).ok();
        let http = offset.and_then(|o| self.base_http_port.checked_add(o));
        let staking = http.and_then(|p| p.checked_add(1));
        match (http, staking) {
            (Some(http), Some(staking)) => Ok((http, staking)),
            _ => Err(ConfigError::InvalidValue {
                field: "base_http_port",
                reason: format!("no room for {} nodes", self.node_count),
            }
            .into()),
        }
    }

    /// Config for relaunching `previous` with new start parameters.
    ///
    /// Name, directories, and ports are kept. An empty executable path in
    /// `params` keeps the previous one.
    pub fn relaunch(previous: &NodeConfig, params: &StartParams) -> Result<NodeConfig> {
        let exec_path = if params.exec_path.as_os_str().is_empty() {
            previous.exec_path.clone()
        } else {
            params.exec_path.clone()
        };
        let log_level = normalize_log_level(params.log_level.as_deref().unwrap_or_default());

        let payload = render_payload(&PayloadFields {
            log_level: &log_level,
            log_dir: &previous.log_dir,
            db_dir: &previous.db_dir,
            whitelisted_subnets: &params.whitelisted_subnets,
            http_port: previous.http_port,
            staking_port: previous.staking_port,
        })?;

        Ok(NodeConfig {
            name: previous.name.clone(),
            exec_path,
            log_dir: previous.log_dir.clone(),
            db_dir: previous.db_dir.clone(),
            whitelisted_subnets: params.whitelisted_subnets.clone(),
            http_port: previous.http_port,
            staking_port: previous.staking_port,
            payload,
        })
    }
}

fn normalize_log_level(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        DEFAULT_LOG_LEVEL.to_string()
    } else {
        level.to_ascii_uppercase()
    }
}

struct PayloadFields<'a> {
    log_level: &'a str,
    log_dir: &'a Path,
    db_dir: &'a Path,
    whitelisted_subnets: &'a str,
    http_port: u16,
    staking_port: u16,
}

// Subnet IDs must be whitelisted for custom VM chains to be created.
fn render_payload(fields: &PayloadFields<'_>) -> Result<Vec<u8>> {
    let doc = json!({
        "network-peer-list-gossip-frequency": "250ms",
        "network-max-reconnect-delay": "1s",
        "public-ip": "127.0.0.1",
        "health-check-frequency": "2s",
        "api-admin-enabled": true,
        "api-ipcs-enabled": true,
        "index-enabled": true,
        "log-display-level": "INFO",
        "log-level": fields.log_level,
        "log-dir": fields.log_dir.to_string_lossy(),
        "db-dir": fields.db_dir.to_string_lossy(),
        "whitelisted-subnets": fields.whitelisted_subnets,
        "http-port": fields.http_port,
        "staking-port": fields.staking_port,
    });
    Ok(serde_json::to_vec_pretty(&doc)?)
}
