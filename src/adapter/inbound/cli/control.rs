//! Handler for the `control` commands.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tabled::{Table, Tabled};

use super::command::{ControlArgs, ControlCommand, StartFlags};
use super::output;
use crate::api::ClusterInfo;
use crate::client::{CallContext, Client, ClientConfig, StartOptions, StreamTermination};
use crate::error::Result;

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "URI")]
    uri: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Log Dir")]
    log_dir: String,
}

/// Execute a control subcommand against a running server.
pub async fn execute(args: ControlArgs) -> Result<()> {
    let client = Client::connect(ClientConfig {
        endpoint: args.endpoint.clone(),
        dial_timeout: Duration::from_secs(args.dial_timeout),
    })
    .await?;

    match args.command {
        ControlCommand::Ping => {
            let pid = client.ping().await?;
            if output::is_json() {
                output::json_line("ping", json!({ "pid": pid }));
            } else {
                output::success(&format!("Server is up (pid {pid})"));
            }
        }
        ControlCommand::Start(start) => {
            let pb = output::spinner("Starting cluster");
            match client.start(&start.exec_path, start_options(start.flags)).await {
                Ok(info) => {
                    output::spinner_success(&pb, "Cluster is healthy");
                    print_cluster(&info);
                }
                Err(err) => {
                    output::spinner_fail(&pb, "Cluster failed to start");
                    return Err(err);
                }
            }
        }
        ControlCommand::Health => print_cluster(&client.health().await?),
        ControlCommand::Status => print_cluster(&client.status().await?),
        ControlCommand::Uris => {
            let uris = client.uris().await?;
            if output::is_json() {
                output::json_line("uris", json!({ "uris": uris }));
            } else {
                for uri in &uris {
                    println!("{uri}");
                }
            }
        }
        ControlCommand::StreamStatus(stream) => {
            follow_status(&client, Duration::from_millis(stream.push_interval)).await?;
        }
        ControlCommand::RemoveNode(node) => {
            let info = client.remove_node(&node.name).await?;
            output::success(&format!("Removed {}", node.name));
            print_cluster(&info);
        }
        ControlCommand::RestartNode(restart) => {
            let pb = output::spinner(&format!("Restarting {}", restart.name));
            let exec_path = restart.exec_path.unwrap_or_else(PathBuf::new);
            match client
                .restart_node(&restart.name, &exec_path, start_options(restart.flags))
                .await
            {
                Ok(info) => {
                    output::spinner_success(&pb, &format!("{} is healthy", restart.name));
                    print_cluster(&info);
                }
                Err(err) => {
                    output::spinner_fail(&pb, &format!("{} failed to restart", restart.name));
                    return Err(err);
                }
            }
        }
        ControlCommand::Stop => {
            let info = client.stop().await?;
            output::success("Cluster stopped");
            print_cluster(&info);
        }
    }
    Ok(())
}

fn start_options(flags: StartFlags) -> StartOptions {
    StartOptions {
        whitelisted_subnets: flags.whitelisted_subnets,
        log_level: flags.node_log_level,
    }
}

/// Print snapshots until the stream ends or Ctrl-C.
async fn follow_status(client: &Client, push_interval: Duration) -> Result<()> {
    let (ctx, cancel) = CallContext::with_cancel();
    let mut stream = client.stream_status(ctx, push_interval).await?;
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel.cancel();
    });

    while let Some(info) = stream.recv().await {
        if output::is_json() {
            output::json_line("cluster", json!(info));
        } else {
            let ready = info.node_infos.values().filter(|n| !n.uri.is_empty()).count();
            output::field(
                "Status",
                format!(
                    "{} {}/{} nodes ready",
                    health_label(info.healthy),
                    ready,
                    info.node_names.len()
                ),
            );
        }
    }

    match stream.finish().await {
        StreamTermination::CleanEof => output::success("Stream closed by server"),
        StreamTermination::CallerCancelled => output::warning("Stream cancelled"),
        StreamTermination::TransportFailure(status) => {
            output::error(&format!("Stream failed: {status}"));
        }
    }
    Ok(())
}

fn health_label(healthy: bool) -> String {
    if healthy {
        output::highlight("healthy")
    } else {
        output::muted("not healthy")
    }
}

fn print_cluster(info: &ClusterInfo) {
    if output::is_json() {
        output::json_line("cluster", json!(info));
        return;
    }

    output::field("Healthy", health_label(info.healthy));
    output::field("Pid", info.pid);
    output::field("Root", &info.root_data_dir);

    let rows: Vec<NodeRow> = info
        .node_names
        .iter()
        .filter_map(|name| info.node_infos.get(name))
        .map(|node| NodeRow {
            name: node.name.clone(),
            uri: node.uri.clone(),
            id: node.id.clone(),
            log_dir: node.log_dir.clone(),
        })
        .collect();
    if !rows.is_empty() {
        output::block(&Table::new(rows).to_string());
    }
}
