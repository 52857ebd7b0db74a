//! Scripted [`NodeLauncher`] for driving the orchestrator without processes.
//!
//! - [`ScriptedLauncher`]: configurable health and removal delays,
//!   launch/shutdown failures, never-healthy clusters, and call counters.
//! - [`ScriptedNode`]: a static [`NodeHandle`] reporting
//!   `http://127.0.0.1:<http port>` and `NodeID-<name>-<incarnation>`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::NodeConfig;
use crate::error::{Error, Result};
use crate::port::outbound::launcher::{ClusterHandle, NodeHandle, NodeHandles, NodeLauncher};

/// Invocation counters shared by a launcher and every cluster it creates.
#[derive(Debug, Default)]
pub struct LaunchCounts {
    pub launch: AtomicU32,
    pub shutdown: AtomicU32,
    pub remove: AtomicU32,
    pub add: AtomicU32,
}

#[derive(Debug, Clone, Default)]
struct Script {
    healthy_after: Duration,
    node_healthy_after: Duration,
    never_healthy: bool,
    blank_ids: bool,
    launch_error: Option<String>,
    shutdown_error: Option<String>,
    shutdown_delay: Duration,
    remove_delay: Duration,
}

/// A launcher whose clusters follow a fixed script.
pub struct ScriptedLauncher {
    script: Script,
    counts: Arc<LaunchCounts>,
    launched: Mutex<Vec<NodeConfig>>,
}

impl Default for ScriptedLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLauncher {
    /// Launcher whose clusters report healthy immediately.
    pub fn new() -> Self {
        Self {
            script: Script::default(),
            counts: Arc::new(LaunchCounts::default()),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Report the whole cluster healthy after `delay`.
    pub fn with_healthy_after(mut self, delay: Duration) -> Self {
        self.script.healthy_after = delay;
        self
    }

    /// Report a restarted node healthy after `delay`.
    pub fn with_node_healthy_after(mut self, delay: Duration) -> Self {
        self.script.node_healthy_after = delay;
        self
    }

    /// Never report healthy.
    pub fn never_healthy(mut self) -> Self {
        self.script.never_healthy = true;
        self
    }

    /// Report nodes without identifiers.
    pub fn with_blank_ids(mut self) -> Self {
        self.script.blank_ids = true;
        self
    }

    /// Fail every launch with `message`.
    pub fn with_launch_error(mut self, message: &str) -> Self {
        self.script.launch_error = Some(message.to_string());
        self
    }

    /// Fail every cluster shutdown with `message`.
    pub fn with_shutdown_error(mut self, message: &str) -> Self {
        self.script.shutdown_error = Some(message.to_string());
        self
    }

    /// Make every cluster shutdown take `delay`.
    pub fn with_shutdown_delay(mut self, delay: Duration) -> Self {
        self.script.shutdown_delay = delay;
        self
    }

    /// Make every node removal take `delay`.
    pub fn with_remove_delay(mut self, delay: Duration) -> Self {
        self.script.remove_delay = delay;
        self
    }

    /// Shared counters for asserting call counts.
    pub fn counts(&self) -> Arc<LaunchCounts> {
        Arc::clone(&self.counts)
    }

    pub fn launch_calls(&self) -> u32 {
        self.counts.launch.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> u32 {
        self.counts.shutdown.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> u32 {
        self.counts.remove.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> u32 {
        self.counts.add.load(Ordering::SeqCst)
    }

    /// Configs passed to the most recent launch.
    pub fn launched_configs(&self) -> Vec<NodeConfig> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl NodeLauncher for ScriptedLauncher {
    async fn launch(&self, configs: Vec<NodeConfig>) -> Result<Arc<dyn ClusterHandle>> {
        self.counts.launch.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.script.launch_error {
            return Err(Error::Launch(message.clone()));
        }

        *self.launched.lock() = configs.clone();
        let nodes = configs
            .into_iter()
            .map(|config| (config.name.clone(), (config, 0)))
            .collect();

        Ok(Arc::new(ScriptedCluster {
            script: self.script.clone(),
            counts: Arc::clone(&self.counts),
            nodes: Mutex::new(nodes),
        }))
    }
}

/// A node handle with fixed endpoint values.
#[derive(Debug, Clone)]
pub struct ScriptedNode {
    name: String,
    uri: String,
    id: String,
}

impl ScriptedNode {
    pub fn new(name: &str, uri: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            uri: uri.to_string(),
            id: id.to_string(),
        }
    }
}

impl NodeHandle for ScriptedNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn uri(&self) -> String {
        self.uri.clone()
    }

    fn id(&self) -> String {
        self.id.clone()
    }
}

struct ScriptedCluster {
    script: Script,
    counts: Arc<LaunchCounts>,
    /// Node config plus how many times it has been re-added.
    nodes: Mutex<BTreeMap<String, (NodeConfig, u32)>>,
}

impl ScriptedCluster {
    fn handle(&self, config: &NodeConfig, incarnation: u32) -> Arc<dyn NodeHandle> {
        let uri = format!("http://127.0.0.1:{}", config.http_port);
        let id = if self.script.blank_ids {
            String::new()
        } else {
            format!("NodeID-{}-{incarnation}", config.name)
        };
        Arc::new(ScriptedNode::new(&config.name, &uri, &id))
    }
}

#[async_trait]
impl ClusterHandle for ScriptedCluster {
    async fn wait_healthy(&self) -> Result<NodeHandles> {
        if self.script.never_healthy {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.script.healthy_after).await;

        let nodes = self.nodes.lock();
        Ok(nodes
            .iter()
            .map(|(name, (config, incarnation))| (name.clone(), self.handle(config, *incarnation)))
            .collect())
    }

    async fn wait_node_healthy(&self, name: &str) -> Result<Arc<dyn NodeHandle>> {
        if self.script.never_healthy {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.script.node_healthy_after).await;

        let nodes = self.nodes.lock();
        let (config, incarnation) = nodes.get(name).ok_or_else(|| Error::NotFound {
            name: name.to_string(),
        })?;
        Ok(self.handle(config, *incarnation))
    }

    async fn remove_node(&self, name: &str) -> Result<()> {
        self.counts.remove.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.script.remove_delay).await;
        self.nodes
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })
    }

    async fn add_node(&self, config: NodeConfig) -> Result<()> {
        self.counts.add.fetch_add(1, Ordering::SeqCst);
        let incarnation = self.counts.add.load(Ordering::SeqCst);
        self.nodes
            .lock()
            .insert(config.name.clone(), (config, incarnation));
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.counts.shutdown.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.script.shutdown_delay).await;
        match &self.script.shutdown_error {
            Some(message) => Err(Error::Internal(message.clone())),
            None => Ok(()),
        }
    }
}
