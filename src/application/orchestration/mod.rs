//! Cluster orchestration.
//!
//! Plans node configs, launches them through the [`NodeLauncher`] port,
//! waits for the cluster to report healthy, and tears it down exactly once.
//!
//! # Modules
//!
//! - [`builder`]: per-node config generation
//! - [`orchestrator`]: the stateful [`ClusterOrchestrator`]
//! - `health`: bounded, abortable health waits
//! - [`latch`]: run-once action whose outcome every caller observes
//!
//! [`NodeLauncher`]: crate::port::outbound::launcher::NodeLauncher

pub mod builder;
mod health;
pub mod latch;
pub mod orchestrator;

pub use builder::NodeConfigBuilder;
pub use latch::OnceLatch;
pub use orchestrator::{
    ClusterOrchestrator, OrchestratorOptions, RestartPolicy, DEFAULT_HEALTH_TIMEOUT,
};
