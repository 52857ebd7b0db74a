//! Cluster control port.
//!
//! Implemented by the control service, consumed by the WebSocket server,
//! the HTTP bridge, and in-process drivers.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::ClusterSnapshot;
use crate::error::Result;

/// Parameters for starting a cluster or relaunching one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartParams {
    /// Path to the node binary.
    pub exec_path: PathBuf,
    /// Comma-separated subnet IDs to whitelist. Empty for none.
    pub whitelisted_subnets: String,
    /// Node log level. Defaults to `INFO` when absent.
    pub log_level: Option<String>,
}

impl StartParams {
    pub fn new(exec_path: impl Into<PathBuf>) -> Self {
        Self {
            exec_path: exec_path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_whitelisted_subnets(mut self, subnets: impl Into<String>) -> Self {
        self.whitelisted_subnets = subnets.into();
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }
}

/// A stream of snapshots for one subscriber.
#[async_trait]
pub trait SnapshotFeed: Send {
    /// Next snapshot, or `None` once the feed has ended.
    async fn next(&mut self) -> Option<ClusterSnapshot>;
}

/// Cluster lifecycle operations.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Process id of the serving process.
    fn ping(&self) -> u32;

    /// Launch a cluster and wait until it is healthy.
    async fn start(&self, params: StartParams) -> Result<ClusterSnapshot>;

    /// Current snapshot of the active cluster.
    fn health(&self) -> Result<ClusterSnapshot>;

    /// URIs of every node with an endpoint.
    fn uris(&self) -> Result<Vec<String>>;

    /// Current snapshot of the active cluster.
    fn status(&self) -> Result<ClusterSnapshot>;

    /// Subscribe to snapshots pushed at least once per `push_interval`.
    ///
    /// The feed ends when `cancel` flips to `true`, when the cluster stops,
    /// or when the returned feed is dropped.
    fn stream_status(
        &self,
        push_interval: Duration,
        cancel: watch::Receiver<bool>,
    ) -> Result<Box<dyn SnapshotFeed>>;

    /// Remove one node from the running cluster.
    async fn remove_node(&self, name: &str) -> Result<ClusterSnapshot>;

    /// Relaunch one node under the same name.
    async fn restart_node(&self, name: &str, params: StartParams) -> Result<ClusterSnapshot>;

    /// Stop the cluster and return its final snapshot.
    async fn stop(&self) -> Result<ClusterSnapshot>;
}
