//! Run-once action with a broadcast outcome.
//!
//! The first caller of [`OnceLatch::run`] starts the action; every caller,
//! first or not, waits for the same outcome. The phase flag and the
//! completion broadcast share one `watch` channel, so checking and claiming
//! the latch is a single locked step.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

enum Phase<T> {
    Idle,
    Running,
    Done(T),
    Panicked,
}

impl<T> Phase<T> {
    fn is_finished(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Panicked)
    }
}

/// Executes an action at most once and hands its outcome to all callers.
pub struct OnceLatch<T> {
    phase: Arc<watch::Sender<Phase<T>>>,
}

impl<T> Default for OnceLatch<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OnceLatch<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            phase: Arc::new(phase),
        }
    }

    /// Run `action` if no caller has yet, then wait for the outcome.
    ///
    /// The action runs on its own task, so dropping a waiting caller never
    /// strands the others. Returns `None` if the action panicked.
    pub async fn run<F>(&self, action: F) -> Option<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut rx = self.phase.subscribe();
        let claimed = self.phase.send_if_modified(|phase| {
            if matches!(phase, Phase::Idle) {
                *phase = Phase::Running;
                true
            } else {
                false
            }
        });

        if claimed {
            let phase = Arc::clone(&self.phase);
            tokio::spawn(async move {
                let outcome = match tokio::spawn(action).await {
                    Ok(value) => Phase::Done(value),
                    Err(_) => Phase::Panicked,
                };
                phase.send_replace(outcome);
            });
        }

        let outcome = rx.wait_for(Phase::is_finished).await.ok()?;
        match &*outcome {
            Phase::Done(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Whether some caller has claimed the latch.
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        !matches!(*self.phase.borrow(), Phase::Idle)
    }

    /// Whether the action has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase.borrow().is_finished()
    }
}
