//! Local process launcher.
//!
//! Each node's payload is written to `<db dir>/config.json` and the binary
//! is started as `<exec> --config-file=<path>`. Health is polled through
//! `GET /ext/health` and the identifier read through `info.getNodeID`.
//! Nodes are stopped with SIGTERM and killed after a grace period.

mod launcher;
mod node;
mod probe;

pub use launcher::{ProcessLauncher, ProcessSettings};
pub use node::{ProcessNode, CONFIG_FILE};
pub use probe::NodeProbe;
