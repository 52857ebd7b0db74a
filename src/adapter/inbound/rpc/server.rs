//! WebSocket control-plane server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::adapter::inbound::dispatch::dispatch;
use crate::api::{Request, Response, Status, StreamStatusRequest};
use crate::error::{Error, Result};
use crate::port::inbound::control::ControlApi;

type Sink = SplitSink<WebSocketStream<TcpStream>, Message>;
type Source = SplitStream<WebSocketStream<TcpStream>>;

/// Serves [`ControlApi`] over WebSocket, one connection per call.
pub struct RpcServer {
    api: Arc<dyn ControlApi>,
    listener: TcpListener,
}

impl RpcServer {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr, api: Arc<dyn ControlApi>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { api, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to `true`.
    ///
    /// Open streams are closed cleanly when shutdown begins.
    pub async fn serve(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(addr = %self.local_addr()?, "Control server listening");
        let mut stop = shutdown.clone();
        loop {
            tokio::select! {
                biased;
                () = stopping(&mut stop) => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let api = Arc::clone(&self.api);
                    let shutdown = shutdown.clone();
                    tokio::spawn(
                        handle_connection(api, stream, shutdown)
                            .instrument(info_span!("rpc", %peer)),
                    );
                }
            }
        }
        info!("Control server stopped");
        Ok(())
    }
}

async fn handle_connection(
    api: Arc<dyn ControlApi>,
    stream: TcpStream,
    shutdown: watch::Receiver<bool>,
) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(err) => {
            debug!(error = %err, "WebSocket handshake failed");
            return;
        }
    };
    let (mut sink, mut source) = socket.split();

    let Some(text) = first_text(&mut source).await else {
        return;
    };
    let request = match serde_json::from_str::<Request>(&text) {
        Ok(request) => request,
        Err(err) => {
            let status = Status::from(Error::InvalidArgument(format!("malformed request: {err}")));
            finish(&mut sink, Some(&Response::Error(status))).await;
            return;
        }
    };
    debug!(method = request.method(), "Control request");

    match request {
        Request::StreamStatus(params) => {
            stream_status(api.as_ref(), params, sink, source, shutdown).await;
        }
        unary => {
            let response = dispatch(api.as_ref(), unary).await;
            finish(&mut sink, Some(&response)).await;
        }
    }
}

/// Resolve once `shutdown` flips to `true` or its sender is gone.
async fn stopping(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Read until the first text frame. `None` if the peer leaves first.
async fn first_text(source: &mut Source) -> Option<String> {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) => return None,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "Connection dropped before request");
                return None;
            }
        }
    }
    None
}

async fn send(sink: &mut Sink, response: &Response) -> Result<()> {
    let text = serde_json::to_string(response)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

/// Send an optional last frame and close the connection.
async fn finish(sink: &mut Sink, last: Option<&Response>) {
    if let Some(response) = last {
        if let Err(err) = send(sink, response).await {
            debug!(error = %err, "Failed to send response");
        }
    }
    let _ = sink.close().await;
}

async fn stream_status(
    api: &dyn ControlApi,
    params: StreamStatusRequest,
    mut sink: Sink,
    mut source: Source,
    mut shutdown: watch::Receiver<bool>,
) {
    if params.push_interval_ms == 0 {
        let status = Status::from(Error::InvalidArgument(
            "push_interval_ms must be greater than zero".to_string(),
        ));
        finish(&mut sink, Some(&Response::Error(status))).await;
        return;
    }

    let (cancel_tx, cancel) = watch::channel(false);
    let mut feed = match api.stream_status(Duration::from_millis(params.push_interval_ms), cancel) {
        Ok(feed) => feed,
        Err(err) => {
            finish(&mut sink, Some(&Response::Error(Status::from(&err)))).await;
            return;
        }
    };

    // The peer closing its half is the upstream end of the stream.
    let watcher = tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
        cancel_tx.send_replace(true);
    });

    let mut pushed = 0u64;
    loop {
        tokio::select! {
            biased;
            () = stopping(&mut shutdown) => break,
            next = feed.next() => {
                let Some(snapshot) = next else { break };
                let frame = Response::Cluster { cluster_info: snapshot.into() };
                if let Err(err) = send(&mut sink, &frame).await {
                    warn!(error = %err, "Status push failed");
                    break;
                }
                pushed += 1;
            }
        }
    }

    watcher.abort();
    debug!(pushed, "Status stream ended");
    finish(&mut sink, None).await;
}
