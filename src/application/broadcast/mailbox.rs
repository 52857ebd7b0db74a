//! Single-slot coalescing channel.
//!
//! A [`Mailbox`] holds at most one undelivered value. Posting while a value
//! is pending replaces it, so a slow receiver always sees the newest value
//! and memory never grows with the backlog.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Slot<T> {
    value: Option<T>,
    sender_alive: bool,
    receiver_alive: bool,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    /// Wakes the receiver on post or sender drop.
    to_receiver: Notify,
    /// Wakes the sender on receiver drop.
    to_sender: Notify,
}

/// Constructor namespace for the channel halves.
pub struct Mailbox;

impl Mailbox {
    /// Create a linked sender/receiver pair.
    #[allow(clippy::new_ret_no_self)]
    pub fn new<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                value: None,
                sender_alive: true,
                receiver_alive: true,
            }),
            to_receiver: Notify::new(),
            to_sender: Notify::new(),
        });
        (
            MailboxSender {
                shared: Arc::clone(&shared),
            },
            MailboxReceiver { shared },
        )
    }
}

/// Value returned by [`MailboxSender::post`] once the receiver is gone.
#[derive(Debug, PartialEq, Eq)]
pub struct Closed<T>(pub T);

pub struct MailboxSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> MailboxSender<T> {
    /// Store `value`, replacing any value not yet received.
    ///
    /// Returns `true` if an older pending value was replaced.
    pub fn post(&self, value: T) -> Result<bool, Closed<T>> {
        let replaced = {
            let mut slot = self.shared.slot.lock();
            if !slot.receiver_alive {
                return Err(Closed(value));
            }
            slot.value.replace(value).is_some()
        };
        self.shared.to_receiver.notify_one();
        Ok(replaced)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.shared.slot.lock().receiver_alive
    }

    /// Resolve once the receiver has been dropped.
    pub async fn closed(&self) {
        loop {
            let notified = self.shared.to_sender.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

impl<T> Drop for MailboxSender<T> {
    fn drop(&mut self) {
        self.shared.slot.lock().sender_alive = false;
        self.shared.to_receiver.notify_one();
    }
}

pub struct MailboxReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> MailboxReceiver<T> {
    /// Take the pending value, waiting for one if the slot is empty.
    ///
    /// Returns `None` once the sender is gone and the slot is drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            {
                let mut slot = self.shared.slot.lock();
                if let Some(value) = slot.value.take() {
                    return Some(value);
                }
                if !slot.sender_alive {
                    return None;
                }
            }
            self.shared.to_receiver.notified().await;
        }
    }

    /// Take the pending value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared.slot.lock().value.take()
    }
}

impl<T> Drop for MailboxReceiver<T> {
    fn drop(&mut self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.receiver_alive = false;
            slot.value = None;
        }
        self.shared.to_sender.notify_one();
    }
}
