//! Broadcast channel for committed ledger events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The service
//! publishes the events of every committed transaction, in order, and
//! indexers or tests subscribe to receive them.

use tokio::sync::broadcast;

use super::LedgerEvent;

/// Fan-out of committed [`LedgerEvent`]s.
///
/// Capacity comes from `LEDGER_EVENT_BUS_CAPACITY`. A receiver that falls
/// more than `capacity` events behind loses the oldest ones and sees
/// `RecvError::Lagged` on its next read.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends one event and returns how many receivers got it (zero when
    /// nobody listens).
    pub fn publish(&self, event: LedgerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Publishes a committed batch in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = LedgerEvent>) {
        for event in events {
            let _ = self.publish(event);
        }
    }

    /// Opens a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
