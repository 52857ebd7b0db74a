//! Bounded health waits.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{Error, Result};

/// Wait for `healthy` while racing a stop signal and a deadline.
///
/// Whichever of the three completes first decides the outcome: a stop
/// request yields [`Error::Aborted`], the deadline yields
/// [`Error::HealthTimeout`], and otherwise the collaborator's own result is
/// returned. A dropped stop sender counts as a stop request.
pub(crate) async fn wait_for_healthy<F, T>(
    healthy: F,
    stop: &mut watch::Receiver<bool>,
    timeout: Duration,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = stop.wait_for(|stopped| *stopped) => Err(Error::Aborted),
        _ = tokio::time::sleep(timeout) => Err(Error::HealthTimeout(timeout)),
        result = healthy => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn result_wins_when_ready_first() {
        let (_stop_tx, mut stop) = watch::channel(false);
        let healthy = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, Error>("ready")
        };
        let result = wait_for_healthy(healthy, &mut stop, Duration::from_secs(120)).await;
        assert_eq!(result.unwrap(), "ready");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_yields_health_timeout() {
        let (_stop_tx, mut stop) = watch::channel(false);
        let never = std::future::pending::<Result<()>>();
        let result = wait_for_healthy(never, &mut stop, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(Error::HealthTimeout(d)) if d == Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_yields_aborted_even_if_healthy_follows() {
        let (stop_tx, mut stop) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = stop_tx.send(true);
        });
        let healthy = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Error>(())
        };
        let result = wait_for_healthy(healthy, &mut stop, Duration::from_secs(120)).await;
        assert!(matches!(result, Err(Error::Aborted)));
    }

    #[tokio::test]
    async fn collaborator_error_propagates() {
        let (_stop_tx, mut stop) = watch::channel(false);
        let failing = async { Err::<(), _>(Error::Launch("node crashed".into())) };
        let result = wait_for_healthy(failing, &mut stop, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Launch(_))));
    }

    #[tokio::test]
    async fn already_stopped_aborts_immediately() {
        let (_stop_tx, mut stop) = watch::channel(true);
        let result =
            wait_for_healthy(std::future::pending::<Result<()>>(), &mut stop, Duration::from_secs(5))
                .await;
        assert!(matches!(result, Err(Error::Aborted)));
    }
}
