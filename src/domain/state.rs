//! Orchestrator lifecycle state.

use std::fmt;

/// Lifecycle of a cluster orchestrator.
///
/// Transitions only move forward. `Failed` is reachable only from
/// `Launching`, and `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrchestratorState {
    /// Node configs are planned; nothing is running.
    #[default]
    Created,
    /// Processes are being launched or awaited.
    Launching,
    /// All nodes reported healthy and the registry is published.
    Healthy,
    /// Shutdown has begun.
    Stopping,
    /// Shutdown finished.
    Stopped,
    /// Launch or health wait failed.
    Failed,
}

impl OrchestratorState {
    /// Return a stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Launching => "launching",
            Self::Healthy => "healthy",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Launching)
                | (Self::Created, Self::Stopping)
                | (Self::Launching, Self::Healthy)
                | (Self::Launching, Self::Failed)
                | (Self::Launching, Self::Stopping)
                | (Self::Healthy, Self::Stopping)
                | (Self::Failed, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }

    /// Advance to `next` if legal. Returns whether the state changed.
    pub fn advance(&mut self, next: Self) -> bool {
        if self.can_advance_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }

    /// True once shutdown has begun or finished.
    #[must_use]
    pub const fn is_stopping(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::OrchestratorState::{self, *};

    #[test]
    fn forward_path_is_accepted() {
        let mut state = OrchestratorState::default();
        assert!(state.advance(Launching));
        assert!(state.advance(Healthy));
        assert!(state.advance(Stopping));
        assert!(state.advance(Stopped));
        assert_eq!(state, Stopped);
    }

    #[test]
    fn regressions_are_rejected() {
        let mut state = Healthy;
        assert!(!state.advance(Launching));
        assert!(!state.advance(Created));
        assert!(!state.advance(Failed));
        assert_eq!(state, Healthy);
    }

    #[test]
    fn stopped_is_terminal() {
        for next in [Created, Launching, Healthy, Stopping, Stopped, Failed] {
            assert!(!Stopped.can_advance_to(next), "stopped -> {next}");
        }
    }

    #[test]
    fn failed_only_reachable_from_launching() {
        for from in [Created, Healthy, Stopping, Stopped] {
            assert!(!from.can_advance_to(Failed), "{from} -> failed");
        }
        assert!(Launching.can_advance_to(Failed));
    }
}
