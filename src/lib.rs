//! Localnet - a control plane for local validator clusters.
//!
//! A single server process provisions a cluster of validator nodes on the
//! local machine, waits for it to become healthy, reports its state, and
//! tears it down. Remote callers drive it through a JSON-over-WebSocket
//! control protocol or the HTTP gateway.
//!
//! # Architecture
//!
//! - [`domain`] - Node configs, registry records, lifecycle states, snapshots
//! - [`port`] - Traits at the seams: the control API and the node launcher
//! - [`application`] - Orchestrator, status broadcaster, control service
//! - [`api`] - Wire types and status codes shared by server and client
//! - [`client`] - Client SDK with stream termination classification
//! - [`adapter`] - WebSocket server, HTTP gateway, CLI, process launcher
//! - [`infrastructure`] - Configuration loading and logging setup
//!
//! # Features
//!
//! - `testkit` - Scripted launcher for driving the orchestrator in tests
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use localnet::client::{Client, ClientConfig, StartOptions};
//!
//! # async fn run() -> localnet::error::Result<()> {
//! let client = Client::connect(ClientConfig::default()).await?;
//! let cluster = client.start(Path::new("/usr/local/bin/node"), StartOptions::default()).await?;
//! println!("{} nodes healthy", cluster.node_names.len());
//! client.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod api;
pub mod application;
pub mod client;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
