//! Status streaming.
//!
//! [`StatusBroadcaster`] samples a [`SnapshotSource`] on each subscriber's
//! own cadence and hands the newest snapshot to that subscriber through a
//! single-slot [`Mailbox`](mailbox::Mailbox).

pub mod broadcaster;
pub mod mailbox;

pub use broadcaster::{FeedEnd, SnapshotSource, StatusBroadcaster, Subscription};
pub use mailbox::{Closed, Mailbox, MailboxReceiver, MailboxSender};
