//! Client SDK for the control plane.
//!
//! [`Client`] issues unary calls and opens status streams. A stream's
//! receive loop classifies how it ended ([`StreamTermination`]) so callers
//! can tell a server-side close from a caller cancel from a broken
//! transport.

pub mod classify;
pub mod context;
mod rpc;
mod stream;

pub use classify::{classify, StreamError, StreamTermination};
pub use context::{CallContext, CancelHandle, ContextError};
pub use rpc::{Client, ClientConfig, StartOptions, DEFAULT_DIAL_TIMEOUT, DEFAULT_ENDPOINT};
pub use stream::StatusStream;
