//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Architecture
//!
//! ```text
//!   CLI / RPC / HTTP bridge           (inbound adapters)
//!              │
//!              ▼
//!      port::inbound::ControlApi
//!              │
//!              ▼
//!   ControlService → ClusterOrchestrator   (application)
//!              │
//!              ▼
//!    port::outbound::NodeLauncher
//!              │
//!              ▼
//!   ProcessLauncher / ScriptedLauncher   (outbound adapters)
//! ```

pub mod inbound;
pub mod outbound;
