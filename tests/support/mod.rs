#![allow(dead_code)]

pub mod architecture;

use std::path::PathBuf;
use std::sync::Arc;

use localnet::application::control::ControlService;
use localnet::application::orchestration::OrchestratorOptions;
use localnet::testkit::launcher::ScriptedLauncher;

/// Fresh, not-yet-created root directory under the system temp dir.
pub fn temp_root(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("localnet-{tag}-{}", uuid::Uuid::new_v4()))
}

pub fn options(nodes: usize) -> OrchestratorOptions {
    OrchestratorOptions {
        node_count: nodes,
        root_dir: Some(temp_root("it")),
        ..OrchestratorOptions::default()
    }
}

pub fn service(launcher: Arc<ScriptedLauncher>, nodes: usize) -> Arc<ControlService> {
    Arc::new(ControlService::new(launcher, options(nodes)))
}
