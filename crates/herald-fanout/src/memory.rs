//! In-process fanout hub.
//!
//! Every clone shares one tokio broadcast channel, so several broadcasters in
//! the same process behave like peer instances on a shared bus. Useful for
//! single-process deployments and for exercising multi-instance behavior in
//! tests without an external broker.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    error::FanoutError,
    fanout::{Fanout, MessageStream},
    types::FanoutStatus,
};

/// Channel capacity for the shared hub.
const HUB_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct MemoryFanout {
    tx: broadcast::Sender<(String, String)>,
}

impl MemoryFanout {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Number of open subscriptions across all channels.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MemoryFanout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fanout for MemoryFanout {
    fn name(&self) -> &str {
        "memory"
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), FanoutError> {
        // send() returns Err only when nobody is subscribed; that is not a failure for a bus.
        match self.tx.send((channel.to_string(), message.to_string())) {
            Ok(receivers) => debug!(channel, receivers, "memory fanout published"),
            Err(_) => debug!(channel, "memory fanout published with no subscribers"),
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, FanoutError> {
        let mut rx = self.tx.subscribe();
        let wanted = channel.to_string();

        let stream = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok((channel, message)) if channel == wanted => {
                        yield message;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %wanted, skipped, "memory fanout subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn status(&self) -> FanoutStatus {
        FanoutStatus::Connected
    }
}
