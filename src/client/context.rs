//! Per-call cancellation scope.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a [`CallContext`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    Cancelled,
    DeadlineExceeded,
}

/// Cancels every [`CallContext`] derived from it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// A cancellation signal plus an optional deadline.
///
/// Contexts are cheap to clone. A context is done once its cancel handle
/// fires or its deadline passes, whichever comes first.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: watch::Receiver<bool>,
    // Keeps `background()` contexts from observing a closed channel.
    _keepalive: Option<Arc<watch::Sender<bool>>>,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never done.
    #[must_use]
    pub fn background() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            cancel: rx,
            _keepalive: Some(Arc::new(tx)),
            deadline: None,
        }
    }

    /// A context plus the handle that cancels it.
    #[must_use]
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let ctx = Self {
            cancel: rx,
            _keepalive: Some(Arc::clone(&tx)),
            deadline: None,
        };
        (ctx, CancelHandle { tx })
    }

    /// This context, additionally bounded by `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// This context, additionally bounded by `deadline`. An earlier
    /// existing deadline wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, or `None` while it is live.
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        if *self.cancel.borrow() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolve once the context is done.
    pub async fn done(&self) -> ContextError {
        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
                // Handle dropped without cancelling: never done by cancel.
                std::future::pending::<()>().await;
            }
        };
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = cancelled => ContextError::Cancelled,
                () = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                ContextError::Cancelled
            }
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}
