// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Broadcast Hub: best-effort fan-out of hub events to live observers.
//!
//! Each subscriber owns a bounded queue. [`BroadcastHub::publish`] enqueues
//! with `try_send`, so it never waits on a slow observer. When a queue is
//! full the event is dropped for that observer only and the subscription is
//! marked lagged; after draining what it has, the observer receives
//! [`HubEvent::Resync`] and is expected to re-snapshot.
//!
//! The registry is a reader/writer lock: subscribe and unsubscribe take the
//! write side, publish only reads, so publishers never serialize against each
//! other. Nothing survives a disconnect; a reconnecting observer is a new
//! subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use buzz_proto::HubEvent;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::debug;

/// Registry key of a subscriber.
pub type SubscriberId = u64;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

struct Slot {
    tx: mpsc::Sender<HubEvent>,
    lagged: Arc<AtomicBool>,
}

struct HubInner {
    next_id: AtomicU64,
    buffer: usize,
    subscribers: RwLock<HashMap<SubscriberId, Slot>>,
}

impl HubInner {
    fn remove(&self, id: SubscriberId) -> bool {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }
}

/// Outcome of a single publish, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the event was enqueued for.
    pub delivered: usize,
    /// Subscribers whose queue was full (now lagged).
    pub dropped: usize,
    /// Disconnected subscribers removed during this publish.
    pub pruned: usize,
}

/// Cheaply cloneable handle to the subscriber registry.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    /// Create a hub whose subscribers buffer up to `buffer` events (minimum 1).
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new observer. It receives only events published from now on.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let lagged = Arc::new(AtomicBool::new(false));
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Slot {
                    tx,
                    lagged: Arc::clone(&lagged),
                },
            );
        debug!(subscriber = id, "hub subscribe");
        Subscription {
            id,
            rx,
            lagged,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Remove an observer. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.remove(id);
        if removed {
            debug!(subscriber = id, "hub unsubscribe");
        }
        removed
    }

    /// Number of registered observers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Fire-and-forget delivery of `event` to every current observer.
    pub fn publish(&self, event: &HubEvent) -> PublishReport {
        let mut report = PublishReport::default();
        let mut closed = Vec::new();
        {
            let subscribers = self
                .inner
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            for (id, slot) in subscribers.iter() {
                match slot.tx.try_send(event.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        slot.lagged.store(true, Ordering::Release);
                        report.dropped += 1;
                        debug!(
                            subscriber = id,
                            event = event.event_name(),
                            "subscriber lagging; event dropped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }
        for id in closed {
            if self.inner.remove(id) {
                report.pruned += 1;
            }
        }
        report
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Receiving side of a hub registration. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<HubEvent>,
    lagged: Arc<AtomicBool>,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// Registry key (pass to [`BroadcastHub::unsubscribe`]).
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, waiting if none is queued. `None` once unsubscribed and drained.
    ///
    /// Queued events come first; a lag marker turns into a single
    /// [`HubEvent::Resync`] once the queue is empty.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => {
                if self.lagged.swap(false, Ordering::AcqRel) {
                    return Some(HubEvent::Resync);
                }
                self.rx.recv().await
            }
            Err(TryRecvError::Disconnected) => self.take_resync(),
        }
    }

    /// Non-waiting variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(_) => self.take_resync(),
        }
    }

    fn take_resync(&self) -> Option<HubEvent> {
        self.lagged
            .swap(false, Ordering::AcqRel)
            .then_some(HubEvent::Resync)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use buzz_proto::ClearedPayload;

    fn cleared(n: usize) -> HubEvent {
        HubEvent::Cleared(ClearedPayload { cleared: n })
    }

    #[test]
    fn full_queue_drops_for_that_subscriber_only() {
        let hub = BroadcastHub::new(1);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        let first = hub.publish(&cleared(1));
        assert_eq!(first.delivered, 2);
        assert_eq!(fast.try_recv(), Some(cleared(1)));

        let second = hub.publish(&cleared(2));
        assert_eq!(second.delivered, 1);
        assert_eq!(second.dropped, 1);
        assert_eq!(fast.try_recv(), Some(cleared(2)));

        // queued event first, then the resync marker, then nothing
        assert_eq!(slow.try_recv(), Some(cleared(1)));
        assert_eq!(slow.try_recv(), Some(HubEvent::Resync));
        assert_eq!(slow.try_recv(), None);
    }

    #[test]
    fn dropping_subscription_leaves_registry() {
        let hub = BroadcastHub::default();
        let sub = hub.subscribe();
        let id = sub.id();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(!hub.unsubscribe(id));
    }

    #[test]
    fn explicit_unsubscribe_stops_delivery() {
        let hub = BroadcastHub::default();
        let mut sub = hub.subscribe();
        assert!(hub.unsubscribe(sub.id()));
        let report = hub.publish(&cleared(0));
        assert_eq!(report, PublishReport::default());
        assert_eq!(sub.try_recv(), None);
    }
}
