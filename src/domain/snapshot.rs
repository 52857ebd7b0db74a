//! Point-in-time cluster view.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::node::{NodeConfig, NodeRecord};
use super::state::OrchestratorState;

/// Immutable view of a cluster handed to readers.
///
/// A snapshot is built in one piece from the orchestrator's published
/// registry, so it never mixes records from before and after a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    /// Node names in launch order.
    pub node_names: Vec<String>,
    /// Registry records keyed by node name.
    pub records: BTreeMap<String, NodeRecord>,
    /// Launch configuration keyed by node name.
    pub configs: BTreeMap<String, NodeConfig>,
    /// Process id of the orchestrating process.
    pub pid: u32,
    /// Root directory holding every node's data and logs.
    pub root_data_dir: PathBuf,
    /// Orchestrator lifecycle state when the snapshot was taken.
    pub state: OrchestratorState,
    /// True when the cluster is healthy and every node has an endpoint.
    pub healthy: bool,
}

impl ClusterSnapshot {
    /// Number of nodes in the registry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.node_names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node_names.is_empty()
    }

    /// Look up a node's record.
    pub fn record(&self, name: &str) -> Option<&NodeRecord> {
        self.records.get(name)
    }

    /// Look up a node's launch configuration.
    pub fn config(&self, name: &str) -> Option<&NodeConfig> {
        self.configs.get(name)
    }

    /// URIs of every node with an endpoint, in launch order.
    pub fn uris(&self) -> Vec<String> {
        self.node_names
            .iter()
            .filter_map(|name| self.records.get(name))
            .filter(|record| record.is_ready())
            .map(|record| record.uri().to_string())
            .collect()
    }
}
