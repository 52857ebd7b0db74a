//! Stateful cluster orchestrator.
//!
//! One [`ClusterOrchestrator`] owns one cluster for its whole life:
//!
//! ```text
//! create ──► start ──► (launch ──► health wait ──► publish) ──► stop
//!   Created    Launching                             Healthy     Stopping ──► Stopped
//!                  └──────────── error ──► Failed ───────────────┘
//! ```
//!
//! `start` runs on its own task. Its outcome is reported through a
//! capacity-1 error channel plus a "done" signal and is read by exactly one
//! waiter ([`ClusterOrchestrator::wait_ready`]). `stop` collapses concurrent
//! and repeated calls into a single shutdown sequence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn, Instrument, Span};
use uuid::Uuid;

use super::builder::{NodeConfigBuilder, DEFAULT_BASE_HTTP_PORT, DEFAULT_NODE_COUNT};
use super::health::wait_for_healthy;
use super::latch::OnceLatch;
use crate::application::broadcast::SnapshotSource;
use crate::domain::{ClusterSnapshot, NodeConfig, NodeEndpoint, NodeRecord, OrchestratorState};
use crate::error::{ConfigError, Error, Result};
use crate::port::inbound::control::StartParams;
use crate::port::outbound::launcher::{ClusterHandle, NodeHandle, NodeHandles, NodeLauncher};

/// Ceiling on how long a start or restart waits for health.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(120);

/// What a node restart waits for before reporting success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    /// Wait for the restarted node only.
    #[default]
    Node,
    /// Wait for the whole cluster.
    Cluster,
}

/// Construction options for [`ClusterOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub node_count: usize,
    pub base_http_port: u16,
    pub health_timeout: Duration,
    pub restart_policy: RestartPolicy,
    /// Root data directory. A fresh temp directory when `None`.
    pub root_dir: Option<PathBuf>,
    /// Span every orchestrator log line is recorded under.
    pub span: Span,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            node_count: DEFAULT_NODE_COUNT,
            base_http_port: DEFAULT_BASE_HTTP_PORT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            restart_policy: RestartPolicy::default(),
            root_dir: None,
            span: Span::none(),
        }
    }
}

/// Orchestrator-owned registry. Readers only ever see copies.
struct Registry {
    state: OrchestratorState,
    node_names: Vec<String>,
    configs: BTreeMap<String, NodeConfig>,
    records: BTreeMap<String, NodeRecord>,
}

impl Registry {
    fn ordered_configs(&self) -> Vec<NodeConfig> {
        self.node_names
            .iter()
            .filter_map(|name| self.configs.get(name).cloned())
            .collect()
    }
}

type StopOutcome = std::result::Result<ClusterSnapshot, String>;

/// Launches, health-checks, mutates, and tears down one cluster.
pub struct ClusterOrchestrator {
    launcher: Arc<dyn NodeLauncher>,
    pid: u32,
    root_data_dir: PathBuf,
    health_timeout: Duration,
    restart_policy: RestartPolicy,
    span: Span,
    registry: RwLock<Registry>,
    cluster: Mutex<Option<Arc<dyn ClusterHandle>>>,
    stop_tx: watch::Sender<bool>,
    done_tx: watch::Sender<bool>,
    error_tx: mpsc::Sender<Error>,
    error_rx: Mutex<Option<mpsc::Receiver<Error>>>,
    shutdown: OnceLatch<StopOutcome>,
    mutations: tokio::sync::Mutex<()>,
}

impl ClusterOrchestrator {
    /// Plan a cluster. No process is launched yet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the root data directory cannot be created
    /// or the node configs cannot be generated.
    pub fn create(
        launcher: Arc<dyn NodeLauncher>,
        params: &StartParams,
        options: OrchestratorOptions,
    ) -> Result<Arc<Self>> {
        let root_data_dir = options
            .root_dir
            .unwrap_or_else(|| std::env::temp_dir().join(format!("localnet-{}", Uuid::new_v4())));
        std::fs::create_dir_all(&root_data_dir).map_err(|source| ConfigError::LogDir {
            path: root_data_dir.display().to_string(),
            source,
        })?;

        let configs = NodeConfigBuilder::from_params(params, &root_data_dir)
            .with_node_count(options.node_count)
            .with_base_http_port(options.base_http_port)
            .build()?;

        let node_names: Vec<String> = configs.iter().map(|c| c.name.clone()).collect();
        let records = node_names
            .iter()
            .map(|name| (name.clone(), NodeRecord::pending(name.clone())))
            .collect();
        let configs = configs.into_iter().map(|c| (c.name.clone(), c)).collect();

        let (stop_tx, _) = watch::channel(false);
        let (done_tx, _) = watch::channel(false);
        let (error_tx, error_rx) = mpsc::channel(1);

        options.span.in_scope(|| {
            info!(
                nodes = node_names.len(),
                root = %root_data_dir.display(),
                "Cluster planned"
            );
        });

        Ok(Arc::new(Self {
            launcher,
            pid: std::process::id(),
            root_data_dir,
            health_timeout: options.health_timeout,
            restart_policy: options.restart_policy,
            span: options.span,
            registry: RwLock::new(Registry {
                state: OrchestratorState::Created,
                node_names,
                configs,
                records,
            }),
            cluster: Mutex::new(None),
            stop_tx,
            done_tx,
            error_tx,
            error_rx: Mutex::new(Some(error_rx)),
            shutdown: OnceLatch::new(),
            mutations: tokio::sync::Mutex::new(()),
        }))
    }

    /// Launch the cluster on a background task.
    ///
    /// Returns immediately. Observe the outcome with [`wait_ready`](Self::wait_ready).
    /// Calling `start` on an orchestrator that already left `Created` is a
    /// no-op.
    pub fn start(self: &Arc<Self>) {
        if !self.registry.write().state.advance(OrchestratorState::Launching) {
            self.span.in_scope(|| warn!("Start ignored; cluster already started or stopping"));
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(
            async move {
                if let Err(err) = this.launch_and_wait().await {
                    warn!(error = %err, "Cluster start failed");
                    this.registry.write().state.advance(OrchestratorState::Failed);
                    let _ = this.error_tx.try_send(err);
                }
                this.done_tx.send_replace(true);
            }
            .instrument(self.span.clone()),
        );
    }

    async fn launch_and_wait(&self) -> Result<()> {
        let configs = self.registry.read().ordered_configs();
        info!(nodes = configs.len(), "Creating local cluster");

        let cluster = self.launcher.launch(configs).await.map_err(|err| match err {
            Error::Launch(_) => err,
            other => Error::Launch(other.to_string()),
        })?;
        *self.cluster.lock() = Some(Arc::clone(&cluster));

        info!(timeout = ?self.health_timeout, "Waiting for all nodes to report healthy");
        let mut stop = self.stop_tx.subscribe();
        let nodes = wait_for_healthy(cluster.wait_healthy(), &mut stop, self.health_timeout).await?;
        self.publish(&nodes)
    }

    /// Replace every record in one write so readers see all or nothing.
    fn publish(&self, nodes: &NodeHandles) -> Result<()> {
        let mut registry = self.registry.write();

        let mut records = BTreeMap::new();
        for name in &registry.node_names {
            let node = nodes.get(name).ok_or_else(|| {
                Error::Launch(format!("node {name} missing from healthy cluster"))
            })?;
            records.insert(name.clone(), NodeRecord::ready(name.clone(), endpoint_of(node.as_ref())?));
        }

        if !registry.state.advance(OrchestratorState::Healthy) {
            return Err(Error::Aborted);
        }
        registry.records = records;

        for record in registry.records.values() {
            info!(node = record.name(), id = record.id(), uri = record.uri(), "Node ready");
        }
        Ok(())
    }

    /// Wait for the start task and return its outcome.
    ///
    /// Only one caller may consume the outcome; later calls get
    /// [`Error::Internal`] instead of blocking forever.
    pub async fn wait_ready(&self) -> Result<ClusterSnapshot> {
        let mut errors = self
            .error_rx
            .lock()
            .take()
            .ok_or_else(|| Error::Internal("start outcome already consumed".to_string()))?;

        let mut done = self.done_tx.subscribe();
        let _ = done.wait_for(|finished| *finished).await;

        match errors.try_recv() {
            Ok(err) => Err(err),
            Err(_) => Ok(self.snapshot()),
        }
    }

    /// Stop the cluster. Safe to call any number of times concurrently;
    /// the shutdown sequence runs once and every caller gets its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] when stopping a cluster that had become
    /// healthy fails. Shutdown failures of clusters that never got healthy
    /// are only logged.
    pub async fn stop(self: &Arc<Self>) -> Result<ClusterSnapshot> {
        let this = Arc::clone(self);
        let sequence = async move { this.shutdown_sequence().await }.instrument(self.span.clone());

        match self.shutdown.run(sequence).await {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(message)) => Err(Error::Shutdown(message)),
            None => Err(Error::Internal("shutdown task panicked".to_string())),
        }
    }

    async fn shutdown_sequence(self: Arc<Self>) -> StopOutcome {
        let prior = {
            let mut registry = self.registry.write();
            let prior = registry.state;
            registry.state.advance(OrchestratorState::Stopping);
            prior
        };
        info!(state = %prior, "Stopping cluster");
        self.stop_tx.send_replace(true);
        // Wait out an in-flight remove or restart before tearing down.
        let _serial = self.mutations.lock().await;

        let mut failures = Vec::new();
        if let Some(cluster) = self.take_cluster() {
            if let Err(err) = cluster.shutdown().await {
                failures.push(err.to_string());
            }
        }

        if prior == OrchestratorState::Created {
            // No start task exists to report an outcome, so report one here.
            let _ = self.error_tx.try_send(Error::Aborted);
            self.done_tx.send_replace(true);
        } else {
            let mut done = self.done_tx.subscribe();
            let _ = done.wait_for(|finished| *finished).await;
        }

        // The launch may have finished after the stop signal went out.
        if let Some(cluster) = self.take_cluster() {
            if let Err(err) = cluster.shutdown().await {
                failures.push(err.to_string());
            }
        }

        self.registry.write().state.advance(OrchestratorState::Stopped);
        let snapshot = self.snapshot();

        if failures.is_empty() {
            info!("Terminated cluster");
            return Ok(snapshot);
        }

        let message = failures.join("; ");
        warn!(error = %message, "Terminated cluster with shutdown errors");
        if prior == OrchestratorState::Healthy {
            Err(message)
        } else {
            Ok(snapshot)
        }
    }

    fn take_cluster(&self) -> Option<Arc<dyn ClusterHandle>> {
        self.cluster.lock().take()
    }

    /// Copy of the current registry.
    #[must_use]
    pub fn snapshot(&self) -> ClusterSnapshot {
        let registry = self.registry.read();
        let healthy = registry.state == OrchestratorState::Healthy
            && registry.records.values().all(NodeRecord::is_ready);

        ClusterSnapshot {
            node_names: registry.node_names.clone(),
            records: registry.records.clone(),
            configs: registry.configs.clone(),
            pid: self.pid,
            root_data_dir: self.root_data_dir.clone(),
            state: registry.state,
            healthy,
        }
    }

    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        self.registry.read().state
    }

    pub fn root_data_dir(&self) -> &Path {
        &self.root_data_dir
    }

    /// Receiver that flips to `true` once a stop is requested.
    #[must_use]
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Remove one node from the running cluster.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no node has that name (the registry is left
    /// untouched), [`Error::NotReady`] unless the cluster is healthy.
    pub async fn remove_node(&self, name: &str) -> Result<ClusterSnapshot> {
        let _serial = self.mutations.lock().await;

        async {
            let cluster = self.mutable_cluster(name)?;
            cluster.remove_node(name).await?;

            let mut registry = self.registry.write();
            registry.node_names.retain(|n| n != name);
            registry.records.remove(name);
            registry.configs.remove(name);
            info!(node = name, remaining = registry.node_names.len(), "Removed node");
            drop(registry);

            Ok(self.snapshot())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Relaunch one node under the same name with fresh start parameters.
    ///
    /// The node keeps its directories and ports. Its URI and identifier are
    /// cleared together while it restarts and repopulated together once it
    /// is healthy again. If the relaunch fails after the old process is
    /// gone, the node is dropped from the cluster like a removal and the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], [`Error::NotReady`] as for
    /// [`remove_node`](Self::remove_node), [`Error::Aborted`] if a stop
    /// arrives mid-restart, plus launch and health-wait errors.
    pub async fn restart_node(&self, name: &str, params: &StartParams) -> Result<ClusterSnapshot> {
        let _serial = self.mutations.lock().await;

        async {
            let cluster = self.mutable_cluster(name)?;
            let previous = self
                .registry
                .read()
                .configs
                .get(name)
                .cloned()
                .ok_or_else(|| Error::NotFound {
                    name: name.to_string(),
                })?;
            let config = NodeConfigBuilder::relaunch(&previous, params)?;

            info!(node = name, exec = %config.exec_path.display(), "Restarting node");
            cluster.remove_node(name).await?;
            {
                let mut registry = self.registry.write();
                registry
                    .records
                    .insert(name.to_string(), NodeRecord::pending(name));
                registry.configs.insert(name.to_string(), config.clone());
            }

            match self.relaunch(cluster.as_ref(), name, config).await {
                Ok(endpoint) => {
                    info!(node = name, id = endpoint.id(), uri = endpoint.uri(), "Node restarted");
                    self.registry
                        .write()
                        .records
                        .insert(name.to_string(), NodeRecord::ready(name, endpoint));
                    Ok(self.snapshot())
                }
                Err(err) => {
                    warn!(node = name, error = %err, "Restart failed; dropping node");
                    match cluster.remove_node(name).await {
                        Ok(()) | Err(Error::NotFound { .. }) => {}
                        Err(remove_err) => {
                            warn!(node = name, error = %remove_err, "Cleanup of failed restart failed");
                        }
                    }
                    let mut registry = self.registry.write();
                    registry.node_names.retain(|n| n != name);
                    registry.records.remove(name);
                    registry.configs.remove(name);
                    Err(err)
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Add the relaunched node and wait for it, unless a stop came first.
    async fn relaunch(
        &self,
        cluster: &dyn ClusterHandle,
        name: &str,
        config: NodeConfig,
    ) -> Result<NodeEndpoint> {
        if *self.stop_tx.borrow() {
            return Err(Error::Aborted);
        }
        cluster.add_node(config).await?;
        let node = self.wait_restarted(cluster, name).await?;
        endpoint_of(node.as_ref())
    }

    async fn wait_restarted(
        &self,
        cluster: &dyn ClusterHandle,
        name: &str,
    ) -> Result<Arc<dyn NodeHandle>> {
        let mut stop = self.stop_tx.subscribe();
        match self.restart_policy {
            RestartPolicy::Node => {
                wait_for_healthy(cluster.wait_node_healthy(name), &mut stop, self.health_timeout)
                    .await
            }
            RestartPolicy::Cluster => {
                let nodes =
                    wait_for_healthy(cluster.wait_healthy(), &mut stop, self.health_timeout)
                        .await?;
                nodes.get(name).cloned().ok_or_else(|| {
                    Error::Launch(format!("node {name} missing from healthy cluster"))
                })
            }
        }
    }

    /// Cluster handle for a mutation against `name`.
    fn mutable_cluster(&self, name: &str) -> Result<Arc<dyn ClusterHandle>> {
        let state = {
            let registry = self.registry.read();
            if !registry.records.contains_key(name) {
                return Err(Error::NotFound {
                    name: name.to_string(),
                });
            }
            registry.state
        };
        if state != OrchestratorState::Healthy {
            return Err(Error::NotReady { state });
        }
        self.cluster
            .lock()
            .clone()
            .ok_or(Error::NotReady { state })
    }
}

impl SnapshotSource for ClusterOrchestrator {
    fn snapshot(&self) -> ClusterSnapshot {
        ClusterOrchestrator::snapshot(self)
    }

    fn stopped(&self) -> watch::Receiver<bool> {
        self.stop_signal()
    }
}

fn endpoint_of(node: &dyn NodeHandle) -> Result<NodeEndpoint> {
    let (uri, id) = (node.uri(), node.id());
    if uri.is_empty() || id.is_empty() {
        return Err(Error::Launch(format!(
            "node {} reported an incomplete endpoint",
            node.name()
        )));
    }
    Ok(NodeEndpoint::new(uri, id))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testkit::launcher::ScriptedLauncher;

    fn options(root: &Path, nodes: usize) -> OrchestratorOptions {
        OrchestratorOptions {
            node_count: nodes,
            root_dir: Some(root.to_path_buf()),
            ..OrchestratorOptions::default()
        }
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("localnet-unit-{}", Uuid::new_v4()))
    }

    #[tokio::test(start_paused = true)]
    async fn created_state_has_pending_records() {
        let launcher = Arc::new(ScriptedLauncher::new());
        let orch =
            ClusterOrchestrator::create(launcher, &StartParams::new("/bin/node"), options(&temp_root(), 3))
                .unwrap();

        let snapshot = orch.snapshot();
        assert_eq!(snapshot.state, OrchestratorState::Created);
        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot.healthy);
        assert!(snapshot.records.values().all(|r| r.uri().is_empty() && r.id().is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_reports_aborted_to_waiter() {
        let launcher = Arc::new(ScriptedLauncher::new());
        let orch = ClusterOrchestrator::create(
            launcher.clone(),
            &StartParams::new("/bin/node"),
            options(&temp_root(), 1),
        )
        .unwrap();

        let snapshot = orch.stop().await.unwrap();
        assert_eq!(snapshot.state, OrchestratorState::Stopped);
        assert!(matches!(orch.wait_ready().await, Err(Error::Aborted)));
        assert_eq!(launcher.launch_calls(), 0);
        assert_eq!(launcher.shutdown_calls(), 0);

        orch.start();
        assert_eq!(orch.state(), OrchestratorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn second_waiter_is_rejected() {
        let launcher = Arc::new(ScriptedLauncher::new());
        let orch =
            ClusterOrchestrator::create(launcher, &StartParams::new("/bin/node"), options(&temp_root(), 1))
                .unwrap();
        orch.start();
        orch.wait_ready().await.unwrap();
        assert!(matches!(orch.wait_ready().await, Err(Error::Internal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn incomplete_endpoint_fails_start() {
        let launcher = Arc::new(ScriptedLauncher::new().with_blank_ids());
        let orch =
            ClusterOrchestrator::create(launcher, &StartParams::new("/bin/node"), options(&temp_root(), 2))
                .unwrap();
        orch.start();
        assert!(matches!(orch.wait_ready().await, Err(Error::Launch(_))));
        assert_eq!(orch.state(), OrchestratorState::Failed);
        assert!(orch.snapshot().records.values().all(|r| !r.is_ready()));
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_before_healthy_is_not_ready() {
        let launcher = Arc::new(ScriptedLauncher::new().with_healthy_after(Duration::from_secs(30)));
        let orch =
            ClusterOrchestrator::create(launcher, &StartParams::new("/bin/node"), options(&temp_root(), 2))
                .unwrap();
        orch.start();
        tokio::task::yield_now().await;

        let err = orch.remove_node("node1").await.unwrap_err();
        assert!(matches!(err, Error::NotReady { .. }));
        assert_eq!(orch.snapshot().len(), 2);
    }
}
