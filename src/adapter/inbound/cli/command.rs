//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Local validator cluster control plane
#[derive(Parser, Debug)]
#[command(name = "localnet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the localnet CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control server (foreground)
    Server(ServerArgs),

    /// Drive a running control server
    Control(ControlArgs),
}

/// Arguments for `localnet server`.
///
/// Flags override the matching settings from `--config`.
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port of the WebSocket control server
    #[arg(long)]
    pub port: Option<u16>,

    /// Port of the HTTP gateway
    #[arg(long)]
    pub gateway_port: Option<u16>,

    /// Client dial timeout in seconds
    #[arg(long)]
    pub dial_timeout: Option<u64>,

    /// Log filter (e.g. info, debug, localnet=trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format [pretty, json]
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Arguments for `localnet control`.
#[derive(Args, Debug)]
pub struct ControlArgs {
    /// Control server endpoint (host:port or ws:// URL)
    #[arg(long, default_value = crate::client::DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Dial timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub dial_timeout: u64,

    #[command(subcommand)]
    pub command: ControlCommand,
}

/// Subcommands for `localnet control`.
#[derive(Subcommand, Debug)]
pub enum ControlCommand {
    /// Check that the server is alive
    Ping,
    /// Start a cluster and wait until it is healthy
    Start(StartArgs),
    /// Show cluster health
    Health,
    /// List node URIs
    Uris,
    /// Show cluster status
    Status,
    /// Follow cluster status until the stream ends or Ctrl-C
    StreamStatus(StreamStatusArgs),
    /// Remove a node from the cluster
    RemoveNode(NodeNameArg),
    /// Restart a node under the same name
    RestartNode(RestartNodeArgs),
    /// Stop the cluster
    Stop,
}

/// Node start parameters.
#[derive(Args, Debug, Default)]
pub struct StartFlags {
    /// Comma-separated subnet IDs to whitelist
    #[arg(long)]
    pub whitelisted_subnets: Option<String>,

    /// Node log level (e.g. INFO, DEBUG)
    #[arg(long)]
    pub node_log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Path to the node binary
    #[arg(long)]
    pub exec_path: PathBuf,

    #[command(flatten)]
    pub flags: StartFlags,
}

#[derive(Args, Debug)]
pub struct StreamStatusArgs {
    /// Maximum gap between two updates, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub push_interval: u64,
}

#[derive(Args, Debug)]
pub struct NodeNameArg {
    /// Node name (e.g. node1)
    pub name: String,
}

#[derive(Args, Debug)]
pub struct RestartNodeArgs {
    /// Node name (e.g. node1)
    pub name: String,

    /// New node binary; keeps the current one when omitted
    #[arg(long)]
    pub exec_path: Option<PathBuf>,

    #[command(flatten)]
    pub flags: StartFlags,
}
