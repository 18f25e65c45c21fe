//! Redis PUBLISH/SUBSCRIBE transport.
//!
//! Publishing goes through a lazily created `ConnectionManager`; it is
//! dropped on error so the next publish dials again. Only one dial runs at a
//! time and no lock is held while it does: a publish arriving mid-dial fails
//! at once instead of queueing behind it. Every publish and subscribe is
//! bounded by the configured timeout. Each subscription owns a dedicated
//! pub/sub connection, and its stream ends when that connection is lost.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info, warn};

use crate::{
    error::FanoutError,
    fanout::{Fanout, MessageStream},
    types::FanoutStatus,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RedisFanout {
    client: Client,
    url: String,
    timeout: Duration,
    conn: Mutex<Option<ConnectionManager>>,
    dialing: AtomicBool,
    status: Mutex<FanoutStatus>,
}

/// Clears the dialing flag however the dial ends, cancellation included.
struct DialGuard<'a>(&'a AtomicBool);

impl Drop for DialGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RedisFanout {
    /// Validate the URL. No connection is made until the first publish or subscribe.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    pub fn new(url: &str) -> Result<Self, FanoutError> {
        let client = Client::open(url).map_err(|e| FanoutError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout: DEFAULT_TIMEOUT,
            conn: Mutex::new(None),
            dialing: AtomicBool::new(false),
            status: Mutex::new(FanoutStatus::Connecting),
        })
    }

    /// Bound on each publish or subscribe, dial included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn set_status(&self, status: FanoutStatus) {
        let mut guard = self.status.lock().unwrap_or_else(|e| e.into_inner());
        *guard = status;
    }

    fn cached(&self) -> Option<ConnectionManager> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn forget_connection(&self) {
        self.conn.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Return the shared publish connection, dialing if there is none.
    async fn connection(&self) -> Result<ConnectionManager, FanoutError> {
        if let Some(conn) = self.cached() {
            return Ok(conn);
        }

        if self
            .dialing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FanoutError::Connection("connection attempt in progress".into()));
        }
        let _dialing = DialGuard(&self.dialing);

        match ConnectionManager::new(self.client.clone()).await {
            Ok(conn) => {
                info!(url = %self.url, "connected to Redis");
                self.set_status(FanoutStatus::Connected);
                *self.conn.lock().unwrap_or_else(|e| e.into_inner()) = Some(conn.clone());
                Ok(conn)
            }
            Err(e) => {
                self.set_status(FanoutStatus::Error(e.to_string()));
                Err(FanoutError::Connection(e.to_string()))
            }
        }
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, FanoutError>>,
        timed_out: fn(String) -> FanoutError,
    ) -> Result<T, FanoutError> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => {
                let detail = format!("timed out after {}ms", self.timeout.as_millis());
                warn!(url = %self.url, "Redis {detail}");
                self.forget_connection();
                self.set_status(FanoutStatus::Error(detail.clone()));
                Err(timed_out(detail))
            }
        }
    }

    async fn publish_now(&self, channel: &str, message: &str) -> Result<(), FanoutError> {
        let mut conn = self.connection().await?;

        match conn.publish::<_, _, i64>(channel, message).await {
            Ok(receivers) => {
                debug!(channel, receivers, "published to Redis");
                self.set_status(FanoutStatus::Connected);
                Ok(())
            }
            Err(e) => {
                warn!(channel, error = %e, "Redis publish failed, dropping connection");
                self.forget_connection();
                self.set_status(FanoutStatus::Error(e.to_string()));
                Err(FanoutError::Publish(e.to_string()))
            }
        }
    }

    async fn subscribe_now(&self, channel: &str) -> Result<MessageStream, FanoutError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            self.set_status(FanoutStatus::Error(e.to_string()));
            FanoutError::Subscribe(e.to_string())
        })?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| FanoutError::Subscribe(e.to_string()))?;

        info!(channel, url = %self.url, "subscribed to Redis channel");
        self.set_status(FanoutStatus::Connected);

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(channel = %msg.get_channel_name(), error = %e, "non-text Redis payload skipped");
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl Fanout for RedisFanout {
    fn name(&self) -> &str {
        "redis"
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), FanoutError> {
        self.bounded(self.publish_now(channel, message), FanoutError::Publish)
            .await
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, FanoutError> {
        self.bounded(self.subscribe_now(channel), FanoutError::Subscribe)
            .await
    }

    fn status(&self) -> FanoutStatus {
        self.status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
