//! HTTP probes against a node's API.

use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct HealthReply {
    healthy: bool,
}

#[derive(Debug, Deserialize)]
struct InfoReply {
    result: Option<NodeIdResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NodeIdResult {
    #[serde(rename = "nodeID")]
    node_id: String,
}

/// Probes node HTTP endpoints.
#[derive(Debug, Clone)]
pub struct NodeProbe {
    client: reqwest::Client,
}

impl NodeProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Whether `GET <uri>/ext/health` reports healthy. Connection failures
    /// read as not healthy yet.
    pub async fn is_healthy(&self, uri: &str) -> bool {
        let response = match self.client.get(format!("{uri}/ext/health")).send().await {
            Ok(response) => response,
            Err(_) => return false,
        };
        response
            .json::<HealthReply>()
            .await
            .map(|reply| reply.healthy)
            .unwrap_or(false)
    }

    /// Identifier reported via `info.getNodeID`.
    pub async fn node_id(&self, uri: &str) -> Result<String> {
        let reply: InfoReply = self
            .client
            .post(format!("{uri}/ext/info"))
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "info.getNodeID",
                "params": {},
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (reply.result, reply.error) {
            (Some(result), _) if !result.node_id.is_empty() => Ok(result.node_id),
            (_, Some(error)) => Err(Error::Launch(format!("info.getNodeID failed at {uri}: {error}"))),
            _ => Err(Error::Launch(format!("info.getNodeID returned no id at {uri}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;
    use tokio::net::TcpListener;

    use super::*;

    async fn fake_node(node_id: &'static str) -> String {
        let app = Router::new()
            .route("/ext/health", get(|| async { Json(json!({ "healthy": true })) }))
            .route(
                "/ext/info",
                post(move |Json(body): Json<Value>| async move {
                    assert_eq!(body["method"], "info.getNodeID");
                    Json(json!({ "jsonrpc": "2.0", "id": 1, "result": { "nodeID": node_id } }))
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await });
        uri
    }

    #[tokio::test]
    async fn reads_health_and_node_id() {
        let uri = fake_node("NodeID-7Xhw2mDxuDS44j42TCB6U5579esbSt3Lg").await;
        let probe = NodeProbe::new(reqwest::Client::new());

        assert!(probe.is_healthy(&uri).await);
        assert_eq!(
            probe.node_id(&uri).await.unwrap(),
            "NodeID-7Xhw2mDxuDS44j42TCB6U5579esbSt3Lg"
        );
    }

    #[tokio::test]
    async fn unreachable_node_is_not_healthy() {
        let probe = NodeProbe::new(reqwest::Client::new());
        assert!(!probe.is_healthy("http://127.0.0.1:1").await);
    }

    #[tokio::test]
    async fn blank_node_id_is_an_error() {
        let uri = fake_node("").await;
        let probe = NodeProbe::new(reqwest::Client::new());
        assert!(matches!(probe.node_id(&uri).await, Err(Error::Launch(_))));
    }
}
