//! Inbound adapters: transports and the operator CLI.

pub mod cli;
mod dispatch;
pub mod gateway;
pub mod rpc;

pub use dispatch::dispatch;
