//! HTTP/JSON bridge for the unary control calls.
//!
//! | Route | Body |
//! |---|---|
//! | `POST /v1/ping` | none |
//! | `POST /v1/control/start` | `StartRequest` |
//! | `POST /v1/control/health` | none |
//! | `POST /v1/control/uris` | none |
//! | `POST /v1/control/status` | none |
//! | `POST /v1/control/removenode` | `RemoveNodeRequest` |
//! | `POST /v1/control/restartnode` | `RestartNodeRequest` |
//! | `POST /v1/control/stop` | none |
//!
//! Responses are `Response` JSON; failures carry a `Status` body and an
//! HTTP status derived from its code. Status streaming is WebSocket-only.

mod routes;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::error::Result;
use crate::port::inbound::control::ControlApi;

pub use routes::{http_status, router};

/// Serve the bridge on `listener` until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    api: Arc<dyn ControlApi>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "HTTP gateway listening");
    axum::serve(listener, router(api))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    info!("HTTP gateway stopped");
    Ok(())
}
