//! WebSocket transport for the control plane.
//!
//! One connection per call. The client sends a single JSON [`Request`]
//! text frame. Unary calls are answered with one [`Response`] frame and a
//! close; `stream_status` pushes `Response::Cluster` frames until the feed
//! ends, then closes.
//!
//! [`Request`]: crate::api::Request
//! [`Response`]: crate::api::Response

mod server;

pub use server::RpcServer;
