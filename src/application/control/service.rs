//! Control façade over at most one cluster.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{info, info_span, warn, Instrument};

use crate::application::broadcast::StatusBroadcaster;
use crate::application::orchestration::{ClusterOrchestrator, OrchestratorOptions};
use crate::domain::ClusterSnapshot;
use crate::error::{Error, Result};
use crate::port::inbound::control::{ControlApi, SnapshotFeed, StartParams};
use crate::port::outbound::launcher::NodeLauncher;

const NO_CLUSTER: &str = "no cluster is running";

/// Implements [`ControlApi`] over one orchestrator at a time.
///
/// The service is either without a cluster or has exactly one active
/// orchestrator. Start is rejected with [`Error::AlreadyExists`] while a
/// cluster is active; a start that fails leaves the service without a
/// cluster so the caller may retry, even when the caller gave up waiting.
pub struct ControlService {
    launcher: Arc<dyn NodeLauncher>,
    options: OrchestratorOptions,
    active: Arc<Mutex<Option<Arc<ClusterOrchestrator>>>>,
    last_stopped: Mutex<Option<ClusterSnapshot>>,
    generation: AtomicU64,
}

impl ControlService {
    pub fn new(launcher: Arc<dyn NodeLauncher>, options: OrchestratorOptions) -> Self {
        Self {
            launcher,
            options,
            active: Arc::new(Mutex::new(None)),
            last_stopped: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Whether a cluster is active.
    #[must_use]
    pub fn has_cluster(&self) -> bool {
        self.active.lock().is_some()
    }

    fn current(&self) -> Result<Arc<ClusterOrchestrator>> {
        self.active
            .lock()
            .clone()
            .ok_or_else(|| Error::Unavailable(NO_CLUSTER.to_string()))
    }

    /// Install a new orchestrator, or fail if one is active.
    fn claim(&self, params: &StartParams) -> Result<Arc<ClusterOrchestrator>> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(Error::AlreadyExists);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut options = self.options.clone();
        options.span = info_span!(parent: &self.options.span, "cluster", generation);

        let orchestrator = ClusterOrchestrator::create(Arc::clone(&self.launcher), params, options)?;
        *active = Some(Arc::clone(&orchestrator));
        Ok(orchestrator)
    }

    /// Stop the active cluster, if any. Used on process shutdown.
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(_) | Err(Error::Unavailable(_)) => {}
            Err(err) => warn!(error = %err, "Cluster shutdown failed"),
        }
    }
}

/// Clear the active slot if it still holds `orchestrator`.
fn release(
    active: &Mutex<Option<Arc<ClusterOrchestrator>>>,
    orchestrator: &Arc<ClusterOrchestrator>,
) {
    let mut active = active.lock();
    if active
        .as_ref()
        .is_some_and(|current| Arc::ptr_eq(current, orchestrator))
    {
        *active = None;
    }
}

#[async_trait]
impl ControlApi for ControlService {
    fn ping(&self) -> u32 {
        std::process::id()
    }

    async fn start(&self, params: StartParams) -> Result<ClusterSnapshot> {
        let orchestrator = self.claim(&params)?;
        info!(exec = %params.exec_path.display(), "Starting cluster");
        orchestrator.start();

        // Runs detached so a dropped caller cannot skip the teardown.
        let active = Arc::clone(&self.active);
        let startup = tokio::spawn(
            async move {
                let outcome = orchestrator.wait_ready().await;
                if let Err(err) = &outcome {
                    warn!(error = %err, "Cluster failed to start; tearing down");
                    if let Err(stop_err) = orchestrator.stop().await {
                        warn!(error = %stop_err, "Teardown after failed start reported errors");
                    }
                    release(&active, &orchestrator);
                }
                outcome
            }
            .in_current_span(),
        );

        startup
            .await
            .map_err(|err| Error::Internal(format!("startup task failed: {err}")))?
    }

    fn health(&self) -> Result<ClusterSnapshot> {
        Ok(self.current()?.snapshot())
    }

    fn uris(&self) -> Result<Vec<String>> {
        Ok(self.current()?.snapshot().uris())
    }

    fn status(&self) -> Result<ClusterSnapshot> {
        Ok(self.current()?.snapshot())
    }

    fn stream_status(
        &self,
        push_interval: Duration,
        cancel: watch::Receiver<bool>,
    ) -> Result<Box<dyn SnapshotFeed>> {
        let orchestrator = self.current()?;
        let subscription = StatusBroadcaster::new(orchestrator).subscribe(push_interval, cancel)?;
        Ok(Box::new(subscription))
    }

    async fn remove_node(&self, name: &str) -> Result<ClusterSnapshot> {
        self.current()?.remove_node(name).await
    }

    async fn restart_node(&self, name: &str, params: StartParams) -> Result<ClusterSnapshot> {
        self.current()?.restart_node(name, &params).await
    }

    async fn stop(&self) -> Result<ClusterSnapshot> {
        let orchestrator = match self.current() {
            Ok(orchestrator) => orchestrator,
            Err(err) => {
                return self.last_stopped.lock().clone().ok_or(err);
            }
        };

        let outcome = orchestrator.stop().await;
        release(&self.active, &orchestrator);
        let snapshot = outcome?;
        *self.last_stopped.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrchestratorState;
    use crate::testkit::launcher::ScriptedLauncher;

    fn service(launcher: Arc<ScriptedLauncher>) -> ControlService {
        let root = std::env::temp_dir().join(format!("localnet-svc-{}", uuid::Uuid::new_v4()));
        ControlService::new(
            launcher,
            OrchestratorOptions {
                node_count: 2,
                root_dir: Some(root),
                ..OrchestratorOptions::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn reads_fail_without_cluster() {
        let svc = service(Arc::new(ScriptedLauncher::new()));
        assert!(matches!(svc.health(), Err(Error::Unavailable(_))));
        assert!(matches!(svc.uris(), Err(Error::Unavailable(_))));
        assert!(matches!(svc.stop().await, Err(Error::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let svc = service(Arc::new(ScriptedLauncher::new()));
        svc.start(StartParams::new("/bin/node")).await.unwrap();
        assert!(matches!(
            svc.start(StartParams::new("/bin/node")).await,
            Err(Error::AlreadyExists)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_cluster_returns_last_final_snapshot() {
        let svc = service(Arc::new(ScriptedLauncher::new()));
        svc.start(StartParams::new("/bin/node")).await.unwrap();
        let first = svc.stop().await.unwrap();
        assert_eq!(first.state, OrchestratorState::Stopped);
        assert!(!svc.has_cluster());

        let again = svc.stop().await.unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_releases_the_slot() {
        let launcher = Arc::new(ScriptedLauncher::new().with_launch_error("binary missing"));
        let svc = service(launcher);
        assert!(matches!(
            svc.start(StartParams::new("/bin/node")).await,
            Err(Error::Launch(_))
        ));
        assert!(!svc.has_cluster());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_start_still_tears_down() {
        let launcher = Arc::new(ScriptedLauncher::new().never_healthy());
        let svc = Arc::new(ControlService::new(
            Arc::clone(&launcher) as Arc<dyn NodeLauncher>,
            OrchestratorOptions {
                node_count: 2,
                health_timeout: Duration::from_secs(5),
                root_dir: Some(
                    std::env::temp_dir().join(format!("localnet-svc-{}", uuid::Uuid::new_v4())),
                ),
                ..OrchestratorOptions::default()
            },
        ));

        let caller = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.start(StartParams::new("/bin/node")).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!svc.has_cluster());
        assert_eq!(launcher.shutdown_calls(), 1);

        assert!(matches!(
            svc.start(StartParams::new("/bin/node")).await,
            Err(Error::HealthTimeout(_))
        ));
    }
}
