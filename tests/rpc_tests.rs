//! End-to-end tests: client SDK against the WebSocket control server.

mod support;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use localnet::adapter::inbound::rpc::RpcServer;
use localnet::api::Code;
use localnet::client::{CallContext, Client, ClientConfig, StartOptions, StreamTermination};
use localnet::error::Error;
use localnet::port::inbound::control::ControlApi;
use localnet::testkit::launcher::ScriptedLauncher;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Harness {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<localnet::error::Result<()>>,
}

impl Harness {
    async fn start(launcher: ScriptedLauncher, nodes: usize) -> Self {
        let api: Arc<dyn ControlApi> = support::service(Arc::new(launcher), nodes);
        let server = RpcServer::bind("127.0.0.1:0".parse().unwrap(), api)
            .await
            .expect("bind");
        let addr = server.local_addr().expect("local addr");
        let (shutdown, rx) = watch::channel(false);
        let server = tokio::spawn(server.serve(rx));
        Self {
            addr,
            shutdown,
            server,
        }
    }

    async fn client(&self) -> Client {
        Client::connect(ClientConfig {
            endpoint: self.addr.to_string(),
            dial_timeout: Duration::from_secs(5),
        })
        .await
        .expect("connect")
    }

    async fn stop(self) {
        self.shutdown.send_replace(true);
        let _ = self.server.await;
    }
}

fn remote_code(err: &Error) -> Option<Code> {
    match err {
        Error::Remote(status) => Some(status.code),
        _ => None,
    }
}

#[tokio::test]
async fn ping_returns_server_pid() {
    let harness = Harness::start(ScriptedLauncher::new(), 1).await;
    let client = harness.client().await;

    assert_eq!(client.ping().await.unwrap(), std::process::id());
    harness.stop().await;
}

#[tokio::test]
async fn connect_to_unreachable_server_fails() {
    let result = Client::connect(ClientConfig {
        endpoint: "127.0.0.1:1".to_string(),
        dial_timeout: Duration::from_secs(2),
    })
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn full_lifecycle_over_the_wire() {
    let harness = Harness::start(ScriptedLauncher::new(), 3).await;
    let client = harness.client().await;

    let started = client
        .start(Path::new("/opt/node/bin/node"), StartOptions::default().with_log_level("debug"))
        .await
        .expect("start");
    assert!(started.healthy);
    assert_eq!(started.node_names, vec!["node1", "node2", "node3"]);
    assert!(started.node_infos.values().all(|n| !n.uri.is_empty() && !n.id.is_empty()));

    let uris = client.uris().await.unwrap();
    assert_eq!(uris.len(), 3);

    let again = client.start(Path::new("/opt/node/bin/node"), StartOptions::default()).await;
    assert_eq!(remote_code(&again.unwrap_err()), Some(Code::AlreadyExists));

    let missing = client.remove_node("node7").await.unwrap_err();
    assert_eq!(remote_code(&missing), Some(Code::NotFound));

    let after = client.remove_node("node3").await.unwrap();
    assert_eq!(after.node_names, vec!["node1", "node2"]);

    let restarted = client
        .restart_node("node1", Path::new(""), StartOptions::default())
        .await
        .unwrap();
    assert_eq!(restarted.node_infos["node1"].exec_path, "/opt/node/bin/node");
    assert_ne!(restarted.node_infos["node1"].id, started.node_infos["node1"].id);

    let stopped = client.stop().await.unwrap();
    assert!(!stopped.healthy);
    assert_eq!(remote_code(&client.health().await.unwrap_err()), Some(Code::Unavailable));

    harness.stop().await;
}

#[tokio::test]
async fn reads_without_cluster_are_unavailable() {
    let harness = Harness::start(ScriptedLauncher::new(), 1).await;
    let client = harness.client().await;

    assert_eq!(remote_code(&client.status().await.unwrap_err()), Some(Code::Unavailable));
    assert_eq!(remote_code(&client.uris().await.unwrap_err()), Some(Code::Unavailable));
    harness.stop().await;
}

#[tokio::test]
async fn stream_ends_with_clean_eof_when_cluster_stops() {
    let harness = Harness::start(ScriptedLauncher::new(), 2).await;
    let client = harness.client().await;
    client.start(Path::new("/opt/node/bin/node"), StartOptions::default()).await.unwrap();

    let mut stream = client
        .stream_status(CallContext::background(), Duration::from_millis(50))
        .await
        .unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .expect("first snapshot")
        .expect("stream open");
    assert!(first.healthy);

    let stopper = harness.client().await;
    stopper.stop().await.unwrap();

    let drain = async {
        while stream.recv().await.is_some() {}
        stream.finish().await
    };
    let termination = tokio::time::timeout(Duration::from_secs(5), drain).await.expect("stream ends");
    assert_eq!(termination, StreamTermination::CleanEof);
    assert!(!termination.is_failure());

    harness.stop().await;
}

#[tokio::test]
async fn cancelling_the_context_is_not_a_failure() {
    let harness = Harness::start(ScriptedLauncher::new(), 1).await;
    let client = harness.client().await;
    client.start(Path::new("/opt/node/bin/node"), StartOptions::default()).await.unwrap();

    let (ctx, cancel) = CallContext::with_cancel();
    let mut stream = client.stream_status(ctx, Duration::from_millis(20)).await.unwrap();
    stream.recv().await.expect("snapshot");
    cancel.cancel();

    let termination = tokio::time::timeout(Duration::from_secs(5), stream.finish())
        .await
        .expect("stream ends");
    assert_eq!(termination, StreamTermination::CallerCancelled);

    client.stop().await.unwrap();
    harness.stop().await;
}

#[tokio::test]
async fn closing_the_client_cancels_its_streams() {
    let harness = Harness::start(ScriptedLauncher::new(), 1).await;
    let client = harness.client().await;
    client.start(Path::new("/opt/node/bin/node"), StartOptions::default()).await.unwrap();

    let stream = client
        .stream_status(CallContext::background(), Duration::from_millis(20))
        .await
        .unwrap();
    client.close();

    let termination = tokio::time::timeout(Duration::from_secs(5), stream.finish())
        .await
        .expect("stream ends");
    assert_eq!(termination, StreamTermination::CallerCancelled);
    harness.stop().await;
}

#[tokio::test]
async fn stream_without_cluster_is_a_transport_failure() {
    let harness = Harness::start(ScriptedLauncher::new(), 1).await;
    let client = harness.client().await;

    let stream = client
        .stream_status(CallContext::background(), Duration::from_millis(20))
        .await
        .unwrap();
    let termination = tokio::time::timeout(Duration::from_secs(5), stream.finish())
        .await
        .expect("stream ends");
    match termination {
        StreamTermination::TransportFailure(status) => assert_eq!(status.code, Code::Unavailable),
        other => panic!("expected transport failure, got {other:?}"),
    }
    harness.stop().await;
}
