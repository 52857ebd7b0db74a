//! Control service tests through the `ControlApi` port.

mod support;

use std::sync::Arc;
use std::time::Duration;

use localnet::domain::OrchestratorState;
use localnet::error::Error;
use localnet::port::inbound::control::{ControlApi, StartParams};
use localnet::testkit::launcher::ScriptedLauncher;
use tokio::sync::watch;

#[tokio::test(start_paused = true)]
async fn start_timeout_tears_down_and_allows_retry() {
    let launcher = Arc::new(ScriptedLauncher::new().never_healthy());
    let svc = Arc::new(localnet::application::control::ControlService::new(
        launcher.clone(),
        localnet::application::orchestration::OrchestratorOptions {
            health_timeout: Duration::from_secs(5),
            ..support::options(2)
        },
    ));

    let err = svc.start(StartParams::new("/opt/node/bin/node")).await.unwrap_err();
    assert!(matches!(err, Error::HealthTimeout(_)));
    assert!(!svc.has_cluster());
    assert_eq!(launcher.shutdown_calls(), 1);

    let err = svc.start(StartParams::new("/opt/node/bin/node")).await.unwrap_err();
    assert!(matches!(err, Error::HealthTimeout(_)));
    assert_eq!(launcher.launch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn status_stream_emits_at_interval_and_ends_on_stop() {
    let svc = support::service(Arc::new(ScriptedLauncher::new()), 2);
    svc.start(StartParams::new("/opt/node/bin/node")).await.unwrap();

    let (_cancel_tx, cancel) = watch::channel(false);
    let mut feed = svc.stream_status(Duration::from_secs(1), cancel).unwrap();

    let first = feed.next().await.expect("immediate snapshot");
    assert!(first.healthy);
    let started = tokio::time::Instant::now();
    feed.next().await.expect("second snapshot");
    assert!(started.elapsed() <= Duration::from_secs(1));

    svc.stop().await.unwrap();
    let mut last = None;
    while let Some(snapshot) = feed.next().await {
        last = Some(snapshot);
    }
    assert!(last.is_some_and(|s| s.state.is_stopping()));
}

#[tokio::test(start_paused = true)]
async fn cancelled_stream_stops_without_affecting_cluster() {
    let svc = support::service(Arc::new(ScriptedLauncher::new()), 1);
    svc.start(StartParams::new("/opt/node/bin/node")).await.unwrap();

    let (cancel_tx, cancel) = watch::channel(false);
    let mut feed = svc.stream_status(Duration::from_millis(200), cancel).unwrap();
    feed.next().await.unwrap();
    cancel_tx.send_replace(true);

    let drained = tokio::time::timeout(Duration::from_secs(1), async {
        while feed.next().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok(), "feed did not end after cancel");
    assert_eq!(svc.status().unwrap().state, OrchestratorState::Healthy);
}

#[tokio::test(start_paused = true)]
async fn many_subscribers_are_independent() {
    let svc = support::service(Arc::new(ScriptedLauncher::new()), 1);
    svc.start(StartParams::new("/opt/node/bin/node")).await.unwrap();

    let (_cancel_tx, cancel) = watch::channel(false);
    let (slow_cancel_tx, slow_cancel) = watch::channel(false);
    let mut fast = svc.stream_status(Duration::from_millis(100), cancel).unwrap();
    let _slow = svc.stream_status(Duration::from_millis(100), slow_cancel).unwrap();

    for _ in 0..10 {
        tokio::time::timeout(Duration::from_millis(150), fast.next())
            .await
            .expect("fast subscriber starved")
            .expect("feed open");
    }
    slow_cancel_tx.send_replace(true);
}

#[tokio::test(start_paused = true)]
async fn stream_without_cluster_is_unavailable() {
    let svc = support::service(Arc::new(ScriptedLauncher::new()), 1);
    let (_cancel_tx, cancel) = watch::channel(false);
    assert!(matches!(
        svc.stream_status(Duration::from_secs(1), cancel),
        Err(Error::Unavailable(_))
    ));
}
