//! Periodic snapshot fan-out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, Instrument};

use super::mailbox::{Mailbox, MailboxReceiver, MailboxSender};
use crate::domain::ClusterSnapshot;
use crate::error::{Error, Result};
use crate::port::inbound::control::SnapshotFeed;

/// What a broadcaster samples.
pub trait SnapshotSource: Send + Sync + 'static {
    /// Current cluster view.
    fn snapshot(&self) -> ClusterSnapshot;

    /// Receiver that flips to `true` once the source stops for good.
    fn stopped(&self) -> watch::Receiver<bool>;
}

/// Why a subscriber's producer task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// The subscriber's cancel signal fired.
    Cancelled,
    /// The source stopped.
    SourceStopped,
    /// The subscriber dropped its end of the feed.
    Disconnected,
}

/// Fans snapshots from one source out to independent subscribers.
///
/// Every subscriber gets its own producer task and its own single-slot
/// mailbox, so a slow subscriber only ever has the newest snapshot waiting
/// and never slows the others down.
pub struct StatusBroadcaster {
    source: Arc<dyn SnapshotSource>,
}

impl StatusBroadcaster {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self { source }
    }

    /// Start a feed that emits immediately and then once per `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a zero interval.
    pub fn subscribe(
        &self,
        interval: Duration,
        cancel: watch::Receiver<bool>,
    ) -> Result<Subscription> {
        if interval.is_zero() {
            return Err(Error::InvalidArgument(
                "push interval must be greater than zero".to_string(),
            ));
        }

        let (tx, rx) = Mailbox::new();
        let source = Arc::clone(&self.source);
        let task = tokio::spawn(
            async move {
                let end = produce(source, tx, interval, cancel).await;
                debug!(reason = ?end, "Status feed ended");
                end
            }
            .in_current_span(),
        );

        Ok(Subscription { rx, task })
    }
}

async fn produce(
    source: Arc<dyn SnapshotSource>,
    tx: MailboxSender<ClusterSnapshot>,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) -> FeedEnd {
    let mut stopped = source.stopped();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.wait_for(|cancelled| *cancelled) => return FeedEnd::Cancelled,
            _ = stopped.wait_for(|stopped| *stopped) => {
                // The final state is still worth delivering.
                let _ = tx.post(source.snapshot());
                return FeedEnd::SourceStopped;
            }
            () = tx.closed() => return FeedEnd::Disconnected,
            _ = ticker.tick() => {
                if tx.post(source.snapshot()).is_err() {
                    return FeedEnd::Disconnected;
                }
            }
        }
    }
}

/// One subscriber's end of a status feed.
///
/// Dropping a subscription stops its producer task.
pub struct Subscription {
    rx: MailboxReceiver<ClusterSnapshot>,
    task: tokio::task::JoinHandle<FeedEnd>,
}

impl Subscription {
    /// Next snapshot, or `None` once the producer has ended and nothing is
    /// pending.
    pub async fn recv(&mut self) -> Option<ClusterSnapshot> {
        self.rx.recv().await
    }

    /// Whether the producer task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Drop the receiving end and wait for the producer to exit.
    pub async fn close(self) -> Option<FeedEnd> {
        let Self { rx, task } = self;
        drop(rx);
        task.await.ok()
    }
}

#[async_trait]
impl SnapshotFeed for Subscription {
    async fn next(&mut self) -> Option<ClusterSnapshot> {
        self.recv().await
    }
}
