//! Per-node configuration and registry records.

use std::fmt;
use std::path::PathBuf;

/// Launch configuration for one node.
///
/// Built once when the cluster is planned. A restart replaces the whole
/// value rather than editing it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Stable node name (`node1`, `node2`, ...).
    pub name: String,
    /// Path to the node binary.
    pub exec_path: PathBuf,
    /// Directory the node writes its logs to.
    pub log_dir: PathBuf,
    /// Directory the node keeps its database in.
    pub db_dir: PathBuf,
    /// Comma-separated subnet IDs the node tracks.
    pub whitelisted_subnets: String,
    /// HTTP API port.
    pub http_port: u16,
    /// Staking (peer-to-peer) port.
    pub staking_port: u16,
    /// Serialized node configuration file contents.
    pub payload: Vec<u8>,
}

/// Address and identity reported by a healthy node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeEndpoint {
    uri: String,
    id: String,
}

impl NodeEndpoint {
    /// Create an endpoint from the node's URI and identifier.
    pub fn new(uri: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            id: id.into(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.uri, self.id)
    }
}

/// Registry entry for one node.
///
/// URI and identifier live together in a single [`NodeEndpoint`], so a
/// record either has both or neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    name: String,
    endpoint: Option<NodeEndpoint>,
}

impl NodeRecord {
    /// Record for a node that has not reported healthy yet.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
        }
    }

    /// Record for a node with a known endpoint.
    pub fn ready(name: impl Into<String>, endpoint: NodeEndpoint) -> Self {
        Self {
            name: name.into(),
            endpoint: Some(endpoint),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> Option<&NodeEndpoint> {
        self.endpoint.as_ref()
    }

    /// URI, or an empty string while pending.
    pub fn uri(&self) -> &str {
        self.endpoint.as_ref().map_or("", NodeEndpoint::uri)
    }

    /// Identifier, or an empty string while pending.
    pub fn id(&self) -> &str {
        self.endpoint.as_ref().map_or("", NodeEndpoint::id)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_record_has_neither_uri_nor_id() {
        let record = NodeRecord::pending("node1");
        assert_eq!(record.name(), "node1");
        assert_eq!(record.uri(), "");
        assert_eq!(record.id(), "");
        assert!(!record.is_ready());
    }

    #[test]
    fn ready_record_has_both_uri_and_id() {
        let record = NodeRecord::ready(
            "node2",
            NodeEndpoint::new("http://127.0.0.1:9652", "NodeID-abc"),
        );
        assert!(record.is_ready());
        assert_eq!(record.uri(), "http://127.0.0.1:9652");
        assert_eq!(record.id(), "NodeID-abc");
    }
}
