//! Control-plane wire protocol.
//!
//! Every call is one WebSocket connection carrying JSON text frames: the
//! client sends a single [`Request`], the server answers with one
//! [`Response`] (or a sequence of them for `stream_status`) and then closes.

mod status;
mod types;

pub use status::{Code, Status};
pub use types::{
    ClusterInfo, NodeInfo, RemoveNodeRequest, Request, Response, RestartNodeRequest,
    StartRequest, StreamStatusRequest,
};
