//! Outbound adapters.

pub mod process;
