//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`launcher`]: scripted [`NodeLauncher`](crate::port::outbound::launcher::NodeLauncher)
//!   whose clusters follow a fixed health/failure script.

pub mod launcher;
