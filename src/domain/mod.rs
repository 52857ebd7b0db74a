//! Cluster domain types.
//!
//! Plain values describing what the orchestrator manages. Nothing in this
//! module performs I/O.

mod node;
mod snapshot;
mod state;

pub use node::{NodeConfig, NodeEndpoint, NodeRecord};
pub use snapshot::ClusterSnapshot;
pub use state::OrchestratorState;
