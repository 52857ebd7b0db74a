use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use crate::adapter::inbound::dispatch::dispatch;
use crate::api::{Code, RemoveNodeRequest, Request, Response, RestartNodeRequest, StartRequest};
use crate::port::inbound::control::ControlApi;

type Api = Arc<dyn ControlApi>;
type Reply = (StatusCode, Json<Response>);

/// Build the bridge router.
pub fn router(api: Api) -> Router {
    Router::new()
        .route("/v1/ping", post(ping))
        .route("/v1/control/start", post(start))
        .route("/v1/control/health", post(health))
        .route("/v1/control/uris", post(uris))
        .route("/v1/control/status", post(status))
        .route("/v1/control/removenode", post(remove_node))
        .route("/v1/control/restartnode", post(restart_node))
        .route("/v1/control/stop", post(stop))
        .with_state(api)
}

/// HTTP status for a wire code.
#[must_use]
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::InvalidArgument | Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        // Client closed request.
        Code::Canceled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown | Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn reply(api: &Api, request: Request) -> Reply {
    let response = dispatch(api.as_ref(), request).await;
    let status = match &response {
        Response::Error(status) => http_status(status.code),
        _ => StatusCode::OK,
    };
    (status, Json(response))
}

async fn ping(State(api): State<Api>) -> Reply {
    reply(&api, Request::Ping).await
}

async fn start(State(api): State<Api>, Json(body): Json<StartRequest>) -> Reply {
    reply(&api, Request::Start(body)).await
}

async fn health(State(api): State<Api>) -> Reply {
    reply(&api, Request::Health).await
}

async fn uris(State(api): State<Api>) -> Reply {
    reply(&api, Request::Uris).await
}

async fn status(State(api): State<Api>) -> Reply {
    reply(&api, Request::Status).await
}

async fn remove_node(State(api): State<Api>, Json(body): Json<RemoveNodeRequest>) -> Reply {
    reply(&api, Request::RemoveNode(body)).await
}

async fn restart_node(State(api): State<Api>, Json(body): Json<RestartNodeRequest>) -> Reply {
    reply(&api, Request::RestartNode(body)).await
}

async fn stop(State(api): State<Api>) -> Reply {
    reply(&api, Request::Stop).await
}
