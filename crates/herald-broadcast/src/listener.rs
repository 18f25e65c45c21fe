use std::sync::Arc;

use futures_util::StreamExt;
use herald_fanout::{Backoff, Fanout};
use herald_protocol::Event;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::broadcaster::{Broadcaster, RelayOutcome};

/// Spawn the task that feeds fanout messages into `broadcaster`.
///
/// The task re-subscribes with `backoff` whenever the subscription fails or
/// its stream ends, and exits once `shutdown` flips to `true` or its sender
/// is dropped. Local publish and delivery keep working while the fanout is
/// unavailable.
pub fn spawn_fanout_listener(
    broadcaster: Arc<Broadcaster>,
    fanout: Arc<dyn Fanout>,
    channel: String,
    mut backoff: Backoff,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let subscribed = tokio::select! {
                result = fanout.subscribe(&channel) => result,
                _ = shutdown.changed() => break,
            };

            match subscribed {
                Ok(mut stream) => {
                    backoff.reset();
                    info!(transport = fanout.name(), channel = %channel, "fanout listener subscribed");

                    loop {
                        tokio::select! {
                            next = stream.next() => match next {
                                Some(raw) => {
                                    handle_message(&broadcaster, &raw);
                                }
                                None => {
                                    warn!(transport = fanout.name(), "fanout subscription ended");
                                    break;
                                }
                            },
                            _ = shutdown.changed() => {
                                info!("fanout listener stopped");
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(transport = fanout.name(), channel = %channel, error = %e, "fanout subscribe failed");
                }
            }

            let delay = backoff.next_delay();
            info!(delay_ms = delay.as_millis() as u64, "re-subscribing to fanout");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("fanout listener stopped");
    })
}

/// Decode one raw fanout message and apply it. Malformed messages are logged
/// and skipped.
pub(crate) fn handle_message(broadcaster: &Broadcaster, raw: &str) -> Option<RelayOutcome> {
    match Event::decode(raw) {
        Ok(event) => Some(broadcaster.on_fanout_message(event)),
        Err(e) => {
            warn!(error = %e, len = raw.len(), "malformed fanout message skipped");
            debug!(raw, "malformed fanout message body");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{config::BroadcastConfig, InstanceId};
    use serde_json::json;

    fn broadcaster(id: &str) -> Broadcaster {
        Broadcaster::new(InstanceId::from(id), BroadcastConfig::default())
    }

    #[test]
    fn malformed_message_is_skipped() {
        let b = broadcaster("a");
        assert_eq!(handle_message(&b, "not json"), None);
        assert_eq!(handle_message(&b, r#"{"eventType":"x"}"#), None);
        assert_eq!(b.history_len(), 0);
    }

    #[test]
    fn peer_message_is_applied() {
        let b = broadcaster("a");
        let raw = Event::new("chat", json!({ "text": "hi" }), 5, InstanceId::from("b"))
            .encode()
            .unwrap();
        assert_eq!(handle_message(&b, &raw), Some(RelayOutcome::Delivered(0)));
        assert_eq!(b.history(None)[0].timestamp, 5);
    }

    #[test]
    fn own_message_is_suppressed() {
        let b = broadcaster("a");
        let raw = Event::new("chat", json!(1), 5, InstanceId::from("a"))
            .encode()
            .unwrap();
        assert_eq!(handle_message(&b, &raw), Some(RelayOutcome::Suppressed));
    }
}
