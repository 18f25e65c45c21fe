use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::{error::FanoutError, types::FanoutStatus};

/// Messages arriving on a subscribed channel, in transport order.
///
/// The stream ends when the underlying subscription is lost; callers
/// re-subscribe to recover.
pub type MessageStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Publish/subscribe channel connecting every instance of the service.
///
/// Delivery is at-least-once, unordered across publishers, and never
/// acknowledged back to the publisher. A publisher may receive its own
/// messages; origin suppression is the caller's job.
#[async_trait]
pub trait Fanout: Send + Sync {
    /// Stable lowercase identifier for this transport (e.g. `"redis"`).
    fn name(&self) -> &str;

    /// Hand one serialized message to every subscriber of `channel`.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), FanoutError>;

    /// Open a new subscription to `channel`.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, FanoutError>;

    /// Return the current runtime status without blocking.
    fn status(&self) -> FanoutStatus;
}
