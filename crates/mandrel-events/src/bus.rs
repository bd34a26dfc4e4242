//! Non-blocking per-subscriber event bus (C2, §4.1).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace};

use crate::event::SessionEvent;

/// Default per-subscriber channel capacity (spec requires >= 64).
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Opaque handle identifying one subscriber for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<SessionEvent>,
}

/// Fan-out point for [`SessionEvent`]s.
///
/// `emit` never blocks the producer: each subscriber has its own bounded
/// channel, and a full subscriber only drops the event for itself — other
/// subscribers and the producer are unaffected. After [`EventBus::close`],
/// `emit` becomes a permanent no-op.
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
}

impl EventBus {
    /// Create a bus with the default per-subscriber capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Create a bus with a custom per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Register a new subscriber, returning its id and a receiver.
    pub async fn subscribe(&self) -> (SubscriberId, EventReceiver) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut subscribers = self.subscribers.write().await;
        subscribers.push(Subscriber { id, sender: tx });

        (id, EventReceiver { receiver: rx })
    }

    /// Broadcast `event` to every subscriber. Never blocks: a full
    /// subscriber's channel drops the event for that subscriber only. A
    /// no-op (returns 0) once the bus is closed.
    ///
    /// Returns the number of subscribers the event was actually delivered
    /// to.
    pub async fn emit(&self, event: SessionEvent) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }

        let subscribers = self.subscribers.read().await;
        let mut delivered = 0;
        for subscriber in subscribers.iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    trace!(kind = event.kind.as_str(), "subscriber full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    trace!(kind = event.kind.as_str(), "subscriber closed, event dropped");
                }
            }
        }
        debug!(kind = event.kind.as_str(), delivered, "event emitted");
        delivered
    }

    /// Remove and close one subscriber. Returns whether it was present.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Close the bus: all current and future subscribers are dropped, and
    /// every subsequent `emit` call is a no-op.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut subscribers = self.subscribers.write().await;
        subscribers.clear();
    }

    /// Current number of active subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Per-subscriber channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether [`EventBus::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-subscriber receiving half of an [`EventBus`] subscription.
pub struct EventReceiver {
    receiver: mpsc::Receiver<SessionEvent>,
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once the bus has closed this
    /// subscriber (via [`EventBus::close`] or [`EventBus::unsubscribe`]).
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive: `None` if nothing is buffered right now.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use uuid::Uuid;

    fn event(kind: EventKind) -> SessionEvent {
        SessionEvent::new(kind, Uuid::nil())
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe().await;

        let delivered = bus.emit(event(EventKind::SessionStart)).await;
        assert_eq!(delivered, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::SessionStart);
    }

    #[tokio::test]
    async fn emit_reaches_all_subscribers() {
        let bus = EventBus::new();
        let (_id1, mut rx1) = bus.subscribe().await;
        let (_id2, mut rx2) = bus.subscribe().await;

        let delivered = bus.emit(event(EventKind::UserInput)).await;
        assert_eq!(delivered, 2);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn full_subscriber_drops_event_without_blocking_others() {
        let bus = EventBus::with_capacity(1);
        let (_id1, rx1) = bus.subscribe().await;
        let (_id2, mut rx2) = bus.subscribe().await;

        // Fill rx1's buffer without draining it, but drain rx2's.
        bus.emit(event(EventKind::TurnLimit)).await;
        assert!(rx2.recv().await.is_some());

        // rx1 is now full (capacity 1); this emit must still reach rx2.
        let delivered = bus.emit(event(EventKind::TurnLimit)).await;
        assert_eq!(delivered, 1);
        assert!(rx2.recv().await.is_some());

        drop(rx1);
    }

    #[tokio::test]
    async fn unsubscribe_removes_subscriber() {
        let bus = EventBus::new();
        let (id, mut rx) = bus.subscribe().await;
        assert_eq!(bus.subscriber_count().await, 1);

        assert!(bus.unsubscribe(id).await);
        assert_eq!(bus.subscriber_count().await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_makes_emit_a_permanent_noop() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe().await;

        bus.close().await;
        assert!(bus.is_closed());
        assert_eq!(bus.subscriber_count().await, 0);

        let delivered = bus.emit(event(EventKind::SessionEnd)).await;
        assert_eq!(delivered, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_is_fine() {
        let bus = EventBus::new();
        assert_eq!(bus.emit(event(EventKind::Error)).await, 0);
    }
}
