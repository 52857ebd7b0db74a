//! Process-level infrastructure: configuration and logging.

pub mod config;
