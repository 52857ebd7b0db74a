//! [`NodeLauncher`] backed by local child processes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::node::ProcessNode;
use super::probe::NodeProbe;
use crate::domain::NodeConfig;
use crate::error::{Error, Result};
use crate::port::outbound::launcher::{ClusterHandle, NodeHandle, NodeHandles, NodeLauncher};

/// Process launcher settings.
#[derive(Debug, Clone)]
pub struct ProcessSettings {
    /// Host the nodes' HTTP APIs listen on.
    pub host: String,
    /// Gap between two health probes of one node.
    pub probe_interval: Duration,
    /// Per-request timeout of a health probe.
    pub probe_timeout: Duration,
    /// Time a node gets to exit after SIGTERM before it is killed.
    pub shutdown_grace: Duration,
    /// Mirror node output onto stdout with a `[nodeN]` prefix.
    pub echo_output: bool,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            probe_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(10),
            echo_output: true,
        }
    }
}

/// Launches every node as a child process of this one.
pub struct ProcessLauncher {
    settings: ProcessSettings,
    probe: NodeProbe,
}

impl ProcessLauncher {
    pub fn new(settings: ProcessSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.probe_timeout)
            .build()?;
        Ok(Self {
            settings,
            probe: NodeProbe::new(client),
        })
    }
}

#[async_trait]
impl NodeLauncher for ProcessLauncher {
    async fn launch(&self, configs: Vec<NodeConfig>) -> Result<Arc<dyn ClusterHandle>> {
        let cluster = ProcessCluster {
            settings: self.settings.clone(),
            probe: self.probe.clone(),
            nodes: Mutex::new(BTreeMap::new()),
            spawned: AtomicUsize::new(0),
        };
        for config in &configs {
            if let Err(err) = cluster.spawn(config) {
                // Do not leave the nodes that did start running.
                let _ = cluster.shutdown().await;
                return Err(err);
            }
        }
        info!(nodes = configs.len(), "Spawned node processes");
        Ok(Arc::new(cluster))
    }
}

struct ProcessCluster {
    settings: ProcessSettings,
    probe: NodeProbe,
    nodes: Mutex<BTreeMap<String, Arc<ProcessNode>>>,
    spawned: AtomicUsize,
}

impl ProcessCluster {
    fn spawn(&self, config: &NodeConfig) -> Result<()> {
        let color = self.spawned.fetch_add(1, Ordering::Relaxed);
        let node = ProcessNode::spawn(config, &self.settings.host, color, self.settings.echo_output)?;
        self.nodes.lock().insert(config.name.clone(), Arc::new(node));
        Ok(())
    }

    fn node(&self, name: &str) -> Result<Arc<ProcessNode>> {
        self.nodes.lock().get(name).cloned().ok_or_else(|| Error::NotFound {
            name: name.to_string(),
        })
    }

    /// Poll one node until it reports healthy, then read its identifier.
    async fn await_node(&self, node: Arc<ProcessNode>) -> Result<Arc<ProcessNode>> {
        let uri = node.uri();
        loop {
            node.ensure_running().await?;
            if self.probe.is_healthy(&uri).await {
                break;
            }
            tokio::time::sleep(self.settings.probe_interval).await;
        }
        let id = self.probe.node_id(&uri).await?;
        debug!(node = node.name(), %id, "Node healthy");
        node.set_id(id);
        Ok(node)
    }
}

#[async_trait]
impl ClusterHandle for ProcessCluster {
    async fn wait_healthy(&self) -> Result<NodeHandles> {
        let nodes: Vec<_> = self.nodes.lock().values().cloned().collect();
        let ready = try_join_all(nodes.into_iter().map(|node| self.await_node(node))).await?;
        Ok(ready
            .into_iter()
            .map(|node| {
                let name = node.name().to_string();
                (name, node as Arc<dyn NodeHandle>)
            })
            .collect())
    }

    async fn wait_node_healthy(&self, name: &str) -> Result<Arc<dyn NodeHandle>> {
        let node = self.node(name)?;
        Ok(self.await_node(node).await?)
    }

    async fn remove_node(&self, name: &str) -> Result<()> {
        let node = self.nodes.lock().remove(name).ok_or_else(|| Error::NotFound {
            name: name.to_string(),
        })?;
        node.terminate(self.settings.shutdown_grace).await
    }

    async fn add_node(&self, config: NodeConfig) -> Result<()> {
        if self.nodes.lock().contains_key(&config.name) {
            return Err(Error::Launch(format!("node {} is already running", config.name)));
        }
        self.spawn(&config)
    }

    async fn shutdown(&self) -> Result<()> {
        let nodes: Vec<_> = std::mem::take(&mut *self.nodes.lock()).into_values().collect();
        let grace = self.settings.shutdown_grace;
        let outcomes =
            futures_util::future::join_all(nodes.iter().map(|node| node.terminate(grace))).await;

        let failures: Vec<String> = nodes
            .iter()
            .zip(outcomes)
            .filter_map(|(node, outcome)| outcome.err().map(|e| format!("{}: {e}", node.name())))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown(failures.join("; ")))
        }
    }
}
