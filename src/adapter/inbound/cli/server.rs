//! Handler for the `server` command.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, info_span};

use super::command::ServerArgs;
use super::output;
use crate::adapter::inbound::{gateway, rpc::RpcServer};
use crate::adapter::outbound::process::{ProcessLauncher, ProcessSettings};
use crate::application::control::ControlService;
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::port::inbound::control::ControlApi;

/// Load settings, then apply command-line overrides.
pub fn resolve_config(args: &ServerArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(port) = args.port {
        config.server.listen = with_port(config.server.listen_addr()?, port);
    }
    if let Some(port) = args.gateway_port {
        config.server.gateway = with_port(config.server.gateway_addr()?, port);
    }
    if let Some(secs) = args.dial_timeout {
        config.server.dial_timeout_secs = secs;
    }
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(format) = &args.log_format {
        config.logging.format.clone_from(format);
    }

    config.validate()?;
    Ok(config)
}

fn with_port(mut addr: SocketAddr, port: u16) -> String {
    addr.set_port(port);
    addr.to_string()
}

/// Execute the server command.
///
/// Serves until SIGINT/SIGTERM or until a listener fails; either way the
/// active cluster is stopped before returning.
pub async fn execute(args: &ServerArgs) -> Result<()> {
    let config = resolve_config(args)?;
    config.init_logging();
    output::header(env!("CARGO_PKG_VERSION"));

    let launcher = Arc::new(ProcessLauncher::new(ProcessSettings {
        probe_timeout: config.server.dial_timeout(),
        ..ProcessSettings::default()
    })?);
    let service = Arc::new(ControlService::new(
        launcher,
        config.orchestrator_options(info_span!("localnet")),
    ));
    let api: Arc<dyn ControlApi> = service.clone();

    let rpc = RpcServer::bind(config.server.listen_addr()?, Arc::clone(&api)).await?;
    let gateway_listener = TcpListener::bind(config.server.gateway_addr()?).await?;
    output::field("Control", output::highlight(rpc.local_addr()?));
    output::field("Gateway", output::highlight(gateway_listener.local_addr()?));
    output::field("Pid", std::process::id());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let servers = async move {
        tokio::try_join!(
            rpc.serve(shutdown_rx.clone()),
            gateway::serve(gateway_listener, api, shutdown_rx.clone()),
        )
        .map(|_| ())
    };
    tokio::pin!(servers);

    let stopped_early = tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received");
            None
        }
        result = &mut servers => Some(result),
    };

    shutdown_tx.send_replace(true);
    let served = match stopped_early {
        Some(result) => result,
        None => servers.await,
    };

    service.shutdown().await;
    info!("localnet stopped");
    served
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn flags_override_file_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nlisten = \"127.0.0.1:7000\"\n[logging]\nlevel = \"debug\"").unwrap();

        let args = ServerArgs {
            config: Some(file.path().to_path_buf()),
            port: Some(7100),
            gateway_port: Some(7101),
            log_format: Some("json".to_string()),
            ..ServerArgs::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:7100");
        assert_eq!(config.server.gateway, "127.0.0.1:7101");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = ServerArgs {
            dial_timeout: Some(0),
            ..ServerArgs::default()
        };
        assert!(resolve_config(&args).is_err());
    }
}
