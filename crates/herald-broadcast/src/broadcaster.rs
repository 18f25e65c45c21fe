//! Per-instance coordinator binding history, local subscribers and the fanout.
//!
//! Every event that reaches this instance passes through one ingest section
//! (stamp, history append, local delivery) guarded by a plain mutex that is
//! never held across an `.await`. Connect runs through the same section, so
//! a new subscriber sees `connected`, then `history`, then live events with
//! no gap and no duplicate.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use herald_core::{
    config::{BroadcastConfig, DEFAULT_FANOUT_TIMEOUT_MS},
    InstanceId, SubscriberId,
};
use herald_fanout::{Fanout, FanoutError, FanoutStatus};
use herald_protocol::{ConnectedNotice, Event, Frame, HistorySnapshot};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::{BroadcastError, Result},
    history::HistoryBuffer,
    registry::{LocalRegistry, Subscriber},
};

/// Outcome of a successful publish.
#[derive(Debug)]
pub struct PublishReceipt {
    pub event: Arc<Event>,
    /// Local subscribers that accepted the event.
    pub delivered: usize,
    /// Set when the event could not be handed to the fanout. Local delivery
    /// and history are unaffected.
    pub fanout_error: Option<FanoutError>,
}

impl PublishReceipt {
    pub fn propagated(&self) -> bool {
        self.fanout_error.is_none()
    }
}

/// What happened to an event received from the fanout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Originated here; already applied at publish time.
    Suppressed,
    /// Applied; carries the number of local subscribers reached.
    Delivered(usize),
    /// Event type cannot be framed; nothing was applied.
    Rejected,
}

/// Event types become the SSE `event:` line, so they must be non-blank and
/// single-line.
pub fn validate_event_type(event_type: &str) -> Result<()> {
    if event_type.trim().is_empty() {
        return Err(BroadcastError::InvalidInput("event type must not be empty".into()));
    }
    if event_type.contains(['\n', '\r']) {
        return Err(BroadcastError::InvalidInput(
            "event type must not contain line breaks".into(),
        ));
    }
    Ok(())
}

struct Ingest {
    history: HistoryBuffer,
    last_timestamp: i64,
    next_frame_id: u64,
}

impl Ingest {
    /// Wall-clock milliseconds, forced strictly increasing on this instance.
    fn stamp(&mut self, now_ms: i64) -> i64 {
        let ts = now_ms.max(self.last_timestamp + 1);
        self.last_timestamp = ts;
        ts
    }

    fn next_frame_id(&mut self) -> u64 {
        self.next_frame_id += 1;
        self.next_frame_id
    }
}

pub struct Broadcaster {
    instance_id: InstanceId,
    config: BroadcastConfig,
    ingest: Mutex<Ingest>,
    registry: LocalRegistry,
    fanout: Option<Arc<dyn Fanout>>,
    channel: String,
    publish_timeout: Duration,
}

impl Broadcaster {
    /// A broadcaster serving only its own subscribers.
    pub fn new(instance_id: InstanceId, config: BroadcastConfig) -> Self {
        let config = config.normalized();
        Self {
            instance_id,
            ingest: Mutex::new(Ingest {
                history: HistoryBuffer::new(config.history_capacity, config.snapshot_limit),
                last_timestamp: 0,
                next_frame_id: 0,
            }),
            config,
            registry: LocalRegistry::new(),
            fanout: None,
            channel: String::new(),
            publish_timeout: Duration::from_millis(DEFAULT_FANOUT_TIMEOUT_MS),
        }
    }

    /// Propagate locally published events to peers over `fanout` on `channel`.
    pub fn with_fanout(mut self, fanout: Arc<dyn Fanout>, channel: impl Into<String>) -> Self {
        self.fanout = Some(fanout);
        self.channel = channel.into();
        self
    }

    /// Longest a publish waits on the fanout before reporting the event as
    /// not propagated.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn lock_ingest(&self) -> MutexGuard<'_, Ingest> {
        self.ingest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish an event from a local producer.
    ///
    /// The event is stamped with this instance's id and a timestamp, appended
    /// to history, delivered to local subscribers, then handed to the fanout.
    /// Invalid input is rejected before any of that happens. A fanout failure
    /// is reported in the receipt, not as an error.
    pub async fn publish(&self, event_type: &str, payload: Option<Value>) -> Result<PublishReceipt> {
        validate_event_type(event_type)?;
        let payload = match payload {
            Some(Value::Null) | None => {
                return Err(BroadcastError::InvalidInput("data is required".into()))
            }
            Some(payload) => payload,
        };

        let (event, delivered) = {
            let mut ingest = self.lock_ingest();
            let timestamp = ingest.stamp(Utc::now().timestamp_millis());
            let event = Arc::new(Event::new(
                event_type,
                payload,
                timestamp,
                self.instance_id.clone(),
            ));
            ingest.history.append(Arc::clone(&event));
            let frame = Arc::new(Frame::event(ingest.next_frame_id(), &event));
            (event, self.registry.deliver_all(&frame))
        };

        debug!(event_type, delivered, timestamp = event.timestamp, "event published locally");

        let fanout_error = self.propagate(&event).await.err();
        Ok(PublishReceipt {
            event,
            delivered,
            fanout_error,
        })
    }

    async fn propagate(&self, event: &Event) -> std::result::Result<(), FanoutError> {
        let Some(fanout) = &self.fanout else {
            return Ok(());
        };
        let message = event
            .encode()
            .map_err(|e| FanoutError::Publish(e.to_string()))?;
        let publish = fanout.publish(&self.channel, &message);
        let sent = tokio::time::timeout(self.publish_timeout, publish)
            .await
            .unwrap_or_else(|_| {
                Err(FanoutError::Publish(format!(
                    "timed out after {}ms",
                    self.publish_timeout.as_millis()
                )))
            });
        sent.map_err(|e| {
            warn!(
                transport = fanout.name(),
                event_type = %event.event_type,
                error = %e,
                "fanout publish failed, event delivered locally only"
            );
            e
        })
    }

    /// Apply an event received from the fanout.
    ///
    /// Events this instance published are dropped: they were applied when
    /// published. Anything else is appended to history and delivered.
    pub fn on_fanout_message(&self, event: Event) -> RelayOutcome {
        if event.is_from(&self.instance_id) {
            debug!(event_type = %event.event_type, "own event echoed by fanout, skipped");
            return RelayOutcome::Suppressed;
        }
        if let Err(e) = validate_event_type(&event.event_type) {
            warn!(origin = %event.origin, error = %e, "peer event rejected");
            return RelayOutcome::Rejected;
        }

        let event = Arc::new(event);
        let delivered = {
            let mut ingest = self.lock_ingest();
            ingest.history.append(Arc::clone(&event));
            let frame = Arc::new(Frame::event(ingest.next_frame_id(), &event));
            self.registry.deliver_all(&frame)
        };

        debug!(
            event_type = %event.event_type,
            origin = %event.origin,
            delivered,
            "relayed event from peer"
        );
        RelayOutcome::Delivered(delivered)
    }

    /// Attach a new connection and return its subscription.
    pub fn connect(self: &Arc<Self>) -> Subscription {
        let (sink, rx) = mpsc::channel(self.config.subscriber_buffer);
        let id = self.on_subscriber_connect(Subscriber {
            id: SubscriberId::new(),
            sink,
        });
        Subscription {
            id,
            rx,
            broadcaster: Arc::clone(self),
        }
    }

    /// Queue the `connected` notice and the history snapshot on the
    /// subscriber's sink, then register it for live delivery.
    ///
    /// The sink should have room for the two initial frames plus any live
    /// events that arrive before the connection starts draining it.
    pub fn on_subscriber_connect(&self, subscriber: Subscriber) -> SubscriberId {
        let id = {
            let mut ingest = self.lock_ingest();

            let notice = ConnectedNotice::new(subscriber.id.clone(), self.instance_id.clone());
            let connected = Frame::connected(ingest.next_frame_id(), &notice);

            let snapshot: HistorySnapshot = ingest
                .history
                .snapshot(None)
                .iter()
                .map(|event| event.as_ref())
                .collect();
            let history = Frame::history(ingest.next_frame_id(), &snapshot);

            for frame in [connected, history] {
                if subscriber.sink.try_send(Arc::new(frame)).is_err() {
                    warn!(subscriber_id = %subscriber.id, "could not queue initial frames");
                    return subscriber.id;
                }
            }
            self.registry.register(subscriber)
        };

        info!(subscriber_id = %id, clients = self.registry.count(), "subscriber connected");
        id
    }

    /// Detach a connection. Unknown or already removed ids are a no-op.
    pub fn disconnect(&self, id: &SubscriberId) -> bool {
        let removed = self.registry.unregister(id);
        if removed {
            info!(subscriber_id = %id, clients = self.registry.count(), "subscriber disconnected");
        }
        removed
    }

    /// Most recent events, oldest first. `None` or `Some(0)` uses the
    /// configured default; larger limits are clamped to the capacity.
    pub fn history(&self, limit: Option<usize>) -> Vec<Arc<Event>> {
        self.lock_ingest().history.snapshot(limit)
    }

    pub fn history_len(&self) -> usize {
        self.lock_ingest().history.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.count()
    }

    pub fn fanout_name(&self) -> Option<&str> {
        self.fanout.as_deref().map(|f| f.name())
    }

    pub fn fanout_status(&self) -> Option<FanoutStatus> {
        self.fanout.as_deref().map(|f| f.status())
    }
}

/// A connection's view of the broadcaster. Dropping it unregisters the
/// subscriber, so a connection task that ends for any reason cleans up.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<Frame>>,
    broadcaster: Arc<Broadcaster>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Next frame to write. `None` once the subscriber has been dropped by
    /// the registry and its queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<Frame>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.disconnect(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn broadcaster() -> Arc<Broadcaster> {
        Arc::new(Broadcaster::new(
            InstanceId::from("inst-a"),
            BroadcastConfig::default(),
        ))
    }

    #[test]
    fn stamp_is_strictly_increasing() {
        let mut ingest = Ingest {
            history: HistoryBuffer::new(1, 1),
            last_timestamp: 0,
            next_frame_id: 0,
        };
        assert_eq!(ingest.stamp(100), 100);
        assert_eq!(ingest.stamp(100), 101);
        assert_eq!(ingest.stamp(50), 102);
        assert_eq!(ingest.stamp(200), 200);
    }

    #[tokio::test]
    async fn publish_stamps_origin_and_records_history() {
        let b = broadcaster();
        let receipt = b.publish("chat", Some(json!({ "text": "hi" }))).await.unwrap();

        assert_eq!(receipt.event.origin, InstanceId::from("inst-a"));
        assert_eq!(receipt.event.event_type, "chat");
        assert!(receipt.event.timestamp > 0);
        assert_eq!(receipt.delivered, 0);
        assert!(receipt.propagated());
        assert_eq!(b.history_len(), 1);
    }

    #[tokio::test]
    async fn publish_rejects_missing_payload() {
        let b = broadcaster();
        assert!(matches!(
            b.publish("chat", None).await,
            Err(BroadcastError::InvalidInput(_))
        ));
        assert!(matches!(
            b.publish("chat", Some(Value::Null)).await,
            Err(BroadcastError::InvalidInput(_))
        ));
        assert_eq!(b.history_len(), 0);
    }

    #[tokio::test]
    async fn publish_rejects_empty_event_type() {
        let b = broadcaster();
        assert!(b.publish("", Some(json!(1))).await.is_err());
        assert!(b.publish("  ", Some(json!(1))).await.is_err());
        assert!(b.publish("a\nb", Some(json!(1))).await.is_err());
        assert_eq!(b.history_len(), 0);
    }

    #[tokio::test]
    async fn timestamps_increase_across_publishes() {
        let b = broadcaster();
        let first = b.publish("tick", Some(json!(1))).await.unwrap();
        let second = b.publish("tick", Some(json!(2))).await.unwrap();
        assert!(second.event.timestamp > first.event.timestamp);
    }

    #[tokio::test]
    async fn own_origin_is_suppressed() {
        let b = broadcaster();
        let own = Event::new("chat", json!(1), 1, InstanceId::from("inst-a"));
        assert_eq!(b.on_fanout_message(own), RelayOutcome::Suppressed);
        assert_eq!(b.history_len(), 0);

        let peer = Event::new("chat", json!(1), 1, InstanceId::from("inst-b"));
        assert_eq!(b.on_fanout_message(peer), RelayOutcome::Delivered(0));
        assert_eq!(b.history_len(), 1);

        let broken = Event::new("a\r\nb", json!(1), 2, InstanceId::from("inst-b"));
        assert_eq!(b.on_fanout_message(broken), RelayOutcome::Rejected);
        assert_eq!(b.history_len(), 1);
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters() {
        let b = broadcaster();
        let sub = b.connect();
        assert_eq!(b.subscriber_count(), 1);
        drop(sub);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn frame_ids_are_monotonic_per_instance() {
        let b = broadcaster();
        let mut sub = b.connect();
        b.publish("chat", Some(json!("x"))).await.unwrap();

        let ids = [
            sub.recv().await.unwrap().id,
            sub.recv().await.unwrap().id,
            sub.recv().await.unwrap().id,
        ];
        assert!(ids[0] < ids[1] && ids[1] < ids[2]);
    }

    #[tokio::test]
    async fn history_limit_falls_back_to_default() {
        let b = Arc::new(Broadcaster::new(
            InstanceId::from("inst-a"),
            BroadcastConfig {
                history_capacity: 5,
                snapshot_limit: 2,
                ..BroadcastConfig::default()
            },
        ));
        for n in 0..4 {
            b.publish("n", Some(json!(n))).await.unwrap();
        }
        assert_eq!(b.history(None).len(), 2);
        assert_eq!(b.history(Some(0)).len(), 2);
        assert_eq!(b.history(Some(100)).len(), 4);
    }
}
