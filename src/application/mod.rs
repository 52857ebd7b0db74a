//! Application services (use cases).
//!
//! These services coordinate domain values and outbound ports to implement
//! the cluster lifecycle.

pub mod broadcast;
pub mod control;
pub mod orchestration;
