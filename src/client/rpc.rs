//! Control-plane client.

use std::path::Path;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use super::context::CallContext;
use super::stream::StatusStream;
use crate::api::{
    ClusterInfo, RemoveNodeRequest, Request, Response, RestartNodeRequest, StartRequest,
    StreamStatusRequest,
};
use crate::error::{Error, Result};

pub(crate) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:8080";

/// Dial timeout used when none is configured.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Client connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host:port` of the control server, or a full `ws://` URL.
    pub endpoint: String,
    /// Bound on connecting plus the initial ping.
    pub dial_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }
}

impl ClientConfig {
    fn url(&self) -> Result<Url> {
        let endpoint = self.endpoint.trim();
        if endpoint.contains("://") {
            Ok(Url::parse(endpoint)?)
        } else {
            Ok(Url::parse(&format!("ws://{endpoint}/"))?)
        }
    }
}

/// Optional start parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub whitelisted_subnets: Option<String>,
    pub log_level: Option<String>,
}

impl StartOptions {
    #[must_use]
    pub fn with_whitelisted_subnets(mut self, subnets: impl Into<String>) -> Self {
        self.whitelisted_subnets = Some(subnets.into());
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    fn into_request(self, exec_path: &Path) -> StartRequest {
        StartRequest {
            exec_path: exec_path.to_string_lossy().into_owned(),
            whitelisted_subnets: self.whitelisted_subnets,
            log_level: self.log_level,
        }
    }
}

/// Thin caller for the control plane.
///
/// Each call opens its own connection. [`close`](Self::close) ends every
/// status stream opened through this client.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    url: Url,
    closed: watch::Sender<bool>,
}

impl Client {
    /// Connect to a control server and verify it answers a ping within the
    /// dial timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unavailable`] if the server cannot be reached in
    /// time, or the underlying transport error.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let url = config.url()?;
        let (closed, _) = watch::channel(false);
        let client = Self {
            config,
            url,
            closed,
        };

        let pid = tokio::time::timeout(client.config.dial_timeout, client.ping())
            .await
            .map_err(|_| {
                Error::Unavailable(format!(
                    "control server at {} did not answer within {:?}",
                    client.url, client.config.dial_timeout
                ))
            })??;
        debug!(endpoint = %client.url, pid, "Connected to control server");
        Ok(client)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn ping(&self) -> Result<u32> {
        self.call(&Request::Ping).await?.into_pid()
    }

    /// Launch a cluster and wait until it is healthy.
    pub async fn start(&self, exec_path: &Path, options: StartOptions) -> Result<ClusterInfo> {
        let request = Request::Start(options.into_request(exec_path));
        self.call(&request).await?.into_cluster()
    }

    pub async fn health(&self) -> Result<ClusterInfo> {
        self.call(&Request::Health).await?.into_cluster()
    }

    pub async fn uris(&self) -> Result<Vec<String>> {
        self.call(&Request::Uris).await?.into_uris()
    }

    pub async fn status(&self) -> Result<ClusterInfo> {
        self.call(&Request::Status).await?.into_cluster()
    }

    /// Open a status stream. Snapshots arrive at least once per
    /// `push_interval` until the stream terminates.
    pub async fn stream_status(
        &self,
        ctx: CallContext,
        push_interval: Duration,
    ) -> Result<StatusStream> {
        let interval_ms = u64::try_from(push_interval.as_millis()).unwrap_or(u64::MAX);
        let request = Request::StreamStatus(StreamStatusRequest {
            push_interval_ms: interval_ms,
        });
        let socket = self.open(&request).await?;
        Ok(StatusStream::spawn(socket, ctx, self.closed.subscribe()))
    }

    pub async fn remove_node(&self, name: &str) -> Result<ClusterInfo> {
        let request = Request::RemoveNode(RemoveNodeRequest {
            name: name.to_string(),
        });
        self.call(&request).await?.into_cluster()
    }

    /// Relaunch one node under the same name. An empty `exec_path` keeps
    /// the node's current binary.
    pub async fn restart_node(
        &self,
        name: &str,
        exec_path: &Path,
        options: StartOptions,
    ) -> Result<ClusterInfo> {
        let request = Request::RestartNode(RestartNodeRequest {
            name: name.to_string(),
            start: options.into_request(exec_path),
        });
        self.call(&request).await?.into_cluster()
    }

    pub async fn stop(&self) -> Result<ClusterInfo> {
        self.call(&Request::Stop).await?.into_cluster()
    }

    /// End every status stream opened through this client.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    async fn open(&self, request: &Request) -> Result<Socket> {
        let dial = connect_async(self.url.as_str());
        let (mut socket, _) = tokio::time::timeout(self.config.dial_timeout, dial)
            .await
            .map_err(|_| Error::Unavailable(format!("dial {} timed out", self.url)))??;
        socket
            .send(Message::Text(serde_json::to_string(request)?))
            .await?;
        Ok(socket)
    }

    async fn call(&self, request: &Request) -> Result<Response> {
        let mut socket = self.open(request).await?;
        debug!(method = request.method(), "Sent control request");

        while let Some(frame) = socket.next().await {
            match frame? {
                Message::Text(text) => {
                    let response: Response = serde_json::from_str(&text)?;
                    let _ = socket.close(None).await;
                    return Ok(response);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(Error::Unavailable(format!(
            "connection closed before {} returned",
            request.method()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_for(endpoint: &str) -> String {
        ClientConfig {
            endpoint: endpoint.to_string(),
            ..ClientConfig::default()
        }
        .url()
        .unwrap()
        .to_string()
    }

    #[test]
    fn bare_endpoint_becomes_ws_url() {
        assert_eq!(url_for("127.0.0.1:8080"), "ws://127.0.0.1:8080/");
        assert_eq!(url_for(" localhost:9000 "), "ws://localhost:9000/");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        assert_eq!(url_for("wss://control.example:443/rpc"), "wss://control.example/rpc");
    }

    #[tokio::test]
    async fn secure_endpoint_dials_the_server() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = Client::connect(ClientConfig {
            endpoint: format!("wss://127.0.0.1:{port}/"),
            dial_timeout: Duration::from_secs(5),
        })
        .await
        .unwrap_err();

        // A refused dial means the TLS connector exists and reached the network.
        match err {
            Error::WebSocket(inner) => assert!(
                matches!(*inner, tokio_tungstenite::tungstenite::Error::Io(_)),
                "unexpected {inner:?}"
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn start_options_fill_request() {
        let request = StartOptions::default()
            .with_whitelisted_subnets("24wYtp,p4jUwq")
            .with_log_level("debug")
            .into_request(Path::new("/opt/node/bin/node"));
        assert_eq!(request.exec_path, "/opt/node/bin/node");
        assert_eq!(request.whitelisted_subnets.as_deref(), Some("24wYtp,p4jUwq"));
        assert_eq!(request.log_level.as_deref(), Some("debug"));
    }
}
