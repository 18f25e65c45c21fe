use std::sync::Arc;

use dashmap::DashMap;
use herald_core::SubscriberId;
use herald_protocol::Frame;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::error::SubscriberWriteFailure;

/// Bounded outbound queue of one connection. The connection task drains it.
pub type FrameSender = mpsc::Sender<Arc<Frame>>;

/// A live connection as seen by this instance.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub sink: FrameSender,
}

/// Connections attached to this instance, keyed by subscriber id.
///
/// Delivery never blocks: a subscriber whose queue is full or whose
/// connection is gone is removed after the sweep and the others still get
/// the frame.
#[derive(Debug, Default)]
pub struct LocalRegistry {
    subscribers: DashMap<SubscriberId, FrameSender>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber and return its handle.
    pub fn register(&self, subscriber: Subscriber) -> SubscriberId {
        let id = subscriber.id;
        self.subscribers.insert(id.clone(), subscriber.sink);
        debug!(subscriber_id = %id, count = self.subscribers.len(), "subscriber registered");
        id
    }

    /// Remove a subscriber. Unknown ids are a no-op; returns whether it was present.
    pub fn unregister(&self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    /// Offer `frame` to every subscriber; returns the number that accepted it.
    pub fn deliver_all(&self, frame: &Arc<Frame>) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(Arc::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    failed.push((entry.key().clone(), SubscriberWriteFailure::QueueFull))
                }
                Err(TrySendError::Closed(_)) => {
                    failed.push((entry.key().clone(), SubscriberWriteFailure::Closed))
                }
            }
        }

        // removal happens outside the iteration so the shard locks are released
        for (id, reason) in failed {
            if self.subscribers.remove(&id).is_some() {
                warn!(subscriber_id = %id, %reason, frame_id = frame.id, "dropping subscriber");
            }
        }

        delivered
    }

    pub fn count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u64) -> Arc<Frame> {
        Arc::new(Frame::new(id, "message", &serde_json::json!({ "n": id })))
    }

    fn subscriber(buffer: usize) -> (Subscriber, mpsc::Receiver<Arc<Frame>>) {
        let (sink, rx) = mpsc::channel(buffer);
        (
            Subscriber {
                id: SubscriberId::new(),
                sink,
            },
            rx,
        )
    }

    #[test]
    fn register_and_count() {
        let registry = LocalRegistry::new();
        let (a, _rx_a) = subscriber(4);
        let (b, _rx_b) = subscriber(4);

        let id_a = registry.register(a);
        registry.register(b);

        assert_eq!(registry.count(), 2);
        assert!(registry.contains(&id_a));
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = LocalRegistry::new();
        let (sub, _rx) = subscriber(4);
        let id = registry.register(sub);

        assert!(registry.unregister(&id));
        assert!(!registry.unregister(&id));
        assert!(!registry.unregister(&SubscriberId::new()));
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn deliver_all_reaches_every_subscriber() {
        let registry = LocalRegistry::new();
        let (a, mut rx_a) = subscriber(4);
        let (b, mut rx_b) = subscriber(4);
        registry.register(a);
        registry.register(b);

        assert_eq!(registry.deliver_all(&frame(1)), 2);
        assert_eq!(rx_a.recv().await.unwrap().id, 1);
        assert_eq!(rx_b.recv().await.unwrap().id, 1);
    }

    #[test]
    fn closed_subscriber_is_removed_and_others_still_served() {
        let registry = LocalRegistry::new();
        let (gone, rx_gone) = subscriber(4);
        let (alive, mut rx_alive) = subscriber(4);
        let gone_id = registry.register(gone);
        registry.register(alive);
        drop(rx_gone);

        assert_eq!(registry.deliver_all(&frame(1)), 1);
        assert!(!registry.contains(&gone_id));
        assert_eq!(registry.count(), 1);
        assert_eq!(rx_alive.try_recv().unwrap().id, 1);
    }

    #[test]
    fn full_queue_disconnects_slow_subscriber() {
        let registry = LocalRegistry::new();
        let (slow, _rx_slow) = subscriber(1);
        let slow_id = registry.register(slow);

        assert_eq!(registry.deliver_all(&frame(1)), 1);
        assert_eq!(registry.deliver_all(&frame(2)), 0);
        assert!(!registry.contains(&slow_id));
    }

    #[test]
    fn deliver_with_no_subscribers_is_zero() {
        let registry = LocalRegistry::new();
        assert_eq!(registry.deliver_all(&frame(1)), 0);
    }
}
