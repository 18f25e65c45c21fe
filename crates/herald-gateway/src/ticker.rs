//! Server-originated events: a startup announcement and a periodic `update`.

use std::{sync::Arc, time::Duration};

use herald_broadcast::Broadcaster;
use herald_core::config::TickerConfig;
use herald_protocol::names;
use serde_json::{json, Value};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

/// Spawn the task that publishes the startup `system` event, if enabled,
/// and then an `update` every `interval_secs`. Neither runs on the caller's
/// task. Returns `None` when there is nothing to publish.
pub fn start(
    broadcaster: Arc<Broadcaster>,
    config: &TickerConfig,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    let period = (config.interval_secs > 0).then(|| Duration::from_secs(config.interval_secs));
    if period.is_none() {
        info!("ticker disabled");
        if !config.announce_startup {
            return None;
        }
    }
    Some(spawn(broadcaster, config.announce_startup, period, shutdown))
}

async fn announce(broadcaster: &Broadcaster) {
    let payload = json!({
        "text": format!("instance {} started", broadcaster.instance_id()),
        "timestamp": chrono::Utc::now().timestamp_millis(),
    });
    if let Err(e) = broadcaster.publish(names::SYSTEM, Some(payload)).await {
        warn!(error = %e, "startup announcement failed");
    }
}

fn tick_payload(broadcaster: &Broadcaster) -> Value {
    json!({
        "text": format!("server time: {}", chrono::Local::now().format("%H:%M:%S")),
        "clients": broadcaster.subscriber_count(),
        "serverId": broadcaster.instance_id(),
    })
}

fn spawn(
    broadcaster: Arc<Broadcaster>,
    announce_startup: bool,
    period: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if announce_startup {
            tokio::select! {
                _ = announce(&broadcaster) => {}
                _ = shutdown.changed() => return,
            }
        }
        let Some(period) = period else {
            return;
        };

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match broadcaster.publish(names::UPDATE, Some(tick_payload(&broadcaster))).await {
                        Ok(receipt) => debug!(delivered = receipt.delivered, "tick published"),
                        Err(e) => warn!(error = %e, "tick publish failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("ticker stopped");
    })
}
