//! Adapters binding the ports to concrete transports and processes.

pub mod inbound;
pub mod outbound;
