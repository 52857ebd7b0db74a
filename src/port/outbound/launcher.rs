//! Node launching port.
//!
//! The process-spawning layer sits behind these traits: given node configs
//! it starts processes and hands back handles exposing each node's URI,
//! identifier, and health. The orchestrator never inspects what a node does
//! once it is running.
//!
//! Waits are cancelled by dropping the returned future; callers bound them
//! with their own deadline and stop signal.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::NodeConfig;
use crate::error::Error;

/// A running node.
pub trait NodeHandle: Send + Sync {
    fn name(&self) -> &str;

    /// HTTP endpoint of the node's API.
    fn uri(&self) -> String;

    /// Identifier the node reports for itself.
    fn id(&self) -> String;
}

/// Node handles keyed by node name.
pub type NodeHandles = HashMap<String, Arc<dyn NodeHandle>>;

/// A launched cluster.
#[async_trait]
pub trait ClusterHandle: Send + Sync {
    /// Resolve once every node reports healthy.
    async fn wait_healthy(&self) -> Result<NodeHandles, Error>;

    /// Resolve once the named node reports healthy.
    async fn wait_node_healthy(&self, name: &str) -> Result<Arc<dyn NodeHandle>, Error>;

    /// Stop and forget one node.
    async fn remove_node(&self, name: &str) -> Result<(), Error>;

    /// Start a node from `config` under `config.name`.
    async fn add_node(&self, config: NodeConfig) -> Result<(), Error>;

    /// Stop every node.
    async fn shutdown(&self) -> Result<(), Error>;
}

/// Factory for clusters.
#[async_trait]
pub trait NodeLauncher: Send + Sync {
    /// Start one process per config and return the cluster handle.
    async fn launch(&self, configs: Vec<NodeConfig>) -> Result<Arc<dyn ClusterHandle>, Error>;
}
