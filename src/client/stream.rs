//! Client side of a status stream.

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use super::classify::{classify, StreamError, StreamTermination};
use super::context::CallContext;
use super::rpc::Socket;
use crate::api::{ClusterInfo, Response, Status};

/// Snapshots received from a status stream.
///
/// The receive loop runs on its own task. [`recv`](Self::recv) returning
/// `None` only means the stream ended; [`finish`](Self::finish) reports why.
pub struct StatusStream {
    rx: mpsc::Receiver<ClusterInfo>,
    task: JoinHandle<StreamTermination>,
}

enum Step {
    Snapshot(ClusterInfo),
    Skip,
    End(StreamError),
}

impl StatusStream {
    pub(crate) fn spawn(socket: Socket, ctx: CallContext, closed: watch::Receiver<bool>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(receive_loop(socket, ctx, closed, tx));
        Self { rx, task }
    }

    /// Next snapshot, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ClusterInfo> {
        self.rx.recv().await
    }

    /// Stop reading and report how the stream ended.
    pub async fn finish(self) -> StreamTermination {
        let Self { rx, task } = self;
        drop(rx);
        task.await.unwrap_or_else(|err| {
            StreamTermination::TransportFailure(Status::internal(format!(
                "receive loop failed: {err}"
            )))
        })
    }
}

async fn receive_loop(
    mut socket: Socket,
    ctx: CallContext,
    mut closed: watch::Receiver<bool>,
    tx: mpsc::Sender<ClusterInfo>,
) -> StreamTermination {
    let termination = loop {
        let step = tokio::select! {
            biased;
            _ = ctx.done() => None,
            () = client_closed(&mut closed) => None,
            frame = socket.next() => Some(read_step(frame)),
        };

        match step {
            None => break StreamTermination::CallerCancelled,
            Some(Step::End(err)) => {
                let ctx_done = ctx.is_done() || *closed.borrow();
                break classify(ctx_done, &err);
            }
            Some(Step::Skip) => {}
            Some(Step::Snapshot(info)) => {
                let delivered = tokio::select! {
                    biased;
                    _ = ctx.done() => false,
                    () = client_closed(&mut closed) => false,
                    sent = tx.send(info) => sent.is_ok(),
                };
                if !delivered {
                    break StreamTermination::CallerCancelled;
                }
            }
        }
    };

    match &termination {
        StreamTermination::CallerCancelled => warn!("Status stream cancelled by caller"),
        StreamTermination::CleanEof => debug!("Status stream closed by server"),
        StreamTermination::TransportFailure(status) => {
            warn!(error = %status, "Status stream failed");
        }
    }

    let _ = socket.close(None).await;
    debug!("closing stream");
    termination
}

fn read_step(frame: Option<Result<Message, tungstenite::Error>>) -> Step {
    let message = match frame {
        None => return Step::End(StreamError::Eof),
        Some(Err(err)) => return Step::End(transport_error(err)),
        Some(Ok(message)) => message,
    };

    match message {
        Message::Text(text) => match serde_json::from_str::<Response>(&text) {
            Ok(Response::Cluster { cluster_info }) => Step::Snapshot(cluster_info),
            Ok(Response::Error(status)) => Step::End(StreamError::Status(status)),
            Ok(other) => Step::End(StreamError::Status(Status::internal(format!(
                "unexpected frame on status stream: {other:?}"
            )))),
            Err(err) => Step::End(StreamError::Status(Status::internal(format!(
                "malformed status frame: {err}"
            )))),
        },
        Message::Close(_) => Step::End(StreamError::Eof),
        // Ping, pong, and binary frames carry nothing for the caller.
        _ => Step::Skip,
    }
}

/// Resolve once the owning client is closed. A dropped client never closes
/// its streams.
async fn client_closed(closed: &mut watch::Receiver<bool>) {
    if closed.wait_for(|closed| *closed).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Map a transport error onto the status the classifier inspects.
fn transport_error(err: tungstenite::Error) -> StreamError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            StreamError::Eof
        }
        other => StreamError::Status(Status::unavailable(other.to_string())),
    }
}
