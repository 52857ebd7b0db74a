//! Unary request dispatch shared by the inbound transports.

use crate::api::{Request, Response, Status};
use crate::domain::ClusterSnapshot;
use crate::error::{Error, Result};
use crate::port::inbound::control::ControlApi;

/// Run one unary request against `api`. Failures become error frames.
pub async fn dispatch(api: &dyn ControlApi, request: Request) -> Response {
    let method = request.method();
    match handle(api, request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(method, error = %err, "Control request failed");
            Response::Error(Status::from(&err))
        }
    }
}

async fn handle(api: &dyn ControlApi, request: Request) -> Result<Response> {
    match request {
        Request::Ping => Ok(Response::Ping { pid: api.ping() }),
        Request::Start(start) => api.start(start.into()).await.map(cluster),
        Request::Health => api.health().map(cluster),
        Request::Uris => api.uris().map(|uris| Response::Uris { uris }),
        Request::Status => api.status().map(cluster),
        Request::StreamStatus(_) => Err(Error::InvalidArgument(
            "stream_status is only served as a stream".to_string(),
        )),
        Request::RemoveNode(remove) => api.remove_node(&remove.name).await.map(cluster),
        Request::RestartNode(restart) => api
            .restart_node(&restart.name, restart.start.into())
            .await
            .map(cluster),
        Request::Stop => api.stop().await.map(cluster),
    }
}

fn cluster(snapshot: ClusterSnapshot) -> Response {
    Response::Cluster {
        cluster_info: snapshot.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::{Code, RemoveNodeRequest, StartRequest, StreamStatusRequest};
    use crate::application::control::ControlService;
    use crate::application::orchestration::OrchestratorOptions;
    use crate::testkit::launcher::ScriptedLauncher;

    fn service() -> ControlService {
        ControlService::new(
            Arc::new(ScriptedLauncher::new()),
            OrchestratorOptions {
                node_count: 2,
                root_dir: Some(
                    std::env::temp_dir().join(format!("localnet-dispatch-{}", uuid::Uuid::new_v4())),
                ),
                ..OrchestratorOptions::default()
            },
        )
    }

    fn code(response: &Response) -> Option<Code> {
        match response {
            Response::Error(status) => Some(status.code),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn errors_become_status_frames() {
        let svc = service();
        assert_eq!(code(&dispatch(&svc, Request::Health).await), Some(Code::Unavailable));

        let start = Request::Start(StartRequest {
            exec_path: "/opt/node/bin/node".to_string(),
            ..StartRequest::default()
        });
        assert!(matches!(dispatch(&svc, start).await, Response::Cluster { .. }));

        let remove = Request::RemoveNode(RemoveNodeRequest {
            name: "nope".to_string(),
        });
        assert_eq!(code(&dispatch(&svc, remove).await), Some(Code::NotFound));
    }

    #[tokio::test]
    async fn stream_status_is_rejected_as_unary() {
        let svc = service();
        let request = Request::StreamStatus(StreamStatusRequest {
            push_interval_ms: 1_000,
        });
        assert_eq!(code(&dispatch(&svc, request).await), Some(Code::InvalidArgument));
    }

    #[tokio::test]
    async fn empty_exec_path_is_invalid() {
        let svc = service();
        let response = dispatch(&svc, Request::Start(StartRequest::default())).await;
        assert_eq!(code(&response), Some(Code::InvalidArgument));
        assert!(!svc.has_cluster());
    }
}
