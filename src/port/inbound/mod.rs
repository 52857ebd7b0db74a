//! Inbound (driving) ports consumed by inbound adapters.
//!
//! - [`control`]: cluster lifecycle operations exposed over RPC and HTTP

pub mod control;
