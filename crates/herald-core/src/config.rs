use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 10;
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;
/// The connected notice and the history frame, plus room for live events
/// that arrive before the connection task first drains the queue.
pub const MIN_SUBSCRIBER_BUFFER: usize = 4;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;
pub const DEFAULT_FANOUT_CHANNEL: &str = "sse-events";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_TICK_SECS: u64 = 10;
/// Upper bound on one fanout publish or subscribe, dial included.
pub const DEFAULT_FANOUT_TIMEOUT_MS: u64 = 2_000;

/// Top-level config (herald.toml + HERALD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub ticker: TickerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS on every route.
    #[serde(default = "bool_true")]
    pub cors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: DEFAULT_PORT,
            cors: true,
        }
    }
}

/// Sizing of the per-instance broadcast engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Maximum number of events retained for replay.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Number of events replayed to a new subscriber, and the default `/history` size.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,
    /// Depth of each subscriber's outbound queue. A subscriber whose queue is
    /// full when an event arrives is disconnected.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// SSE comment heartbeat interval.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        }
    }
}

impl BroadcastConfig {
    /// Clamp values into the ranges the engine relies on.
    pub fn normalized(mut self) -> Self {
        self.history_capacity = self.history_capacity.max(1);
        if self.snapshot_limit == 0 {
            self.snapshot_limit = DEFAULT_SNAPSHOT_LIMIT;
        }
        self.snapshot_limit = self.snapshot_limit.min(self.history_capacity);
        self.subscriber_buffer = self.subscriber_buffer.max(MIN_SUBSCRIBER_BUFFER);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FanoutBackend {
    /// Single-instance mode: no cross-instance propagation.
    #[default]
    None,
    /// Redis PUBLISH/SUBSCRIBE.
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    #[serde(default)]
    pub backend: FanoutBackend,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// Past this, a publish is reported as not propagated and the event
    /// stays local.
    #[serde(default = "default_fanout_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            backend: FanoutBackend::None,
            url: default_redis_url(),
            channel: default_channel(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            timeout_ms: DEFAULT_FANOUT_TIMEOUT_MS,
        }
    }
}

/// Periodic server-originated events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerConfig {
    /// Seconds between `update` events. 0 disables the ticker.
    #[serde(default = "default_tick_secs")]
    pub interval_secs: u64,
    /// Publish a `system` event when the instance starts.
    #[serde(default = "bool_true")]
    pub announce_startup: bool,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_TICK_SECS,
            announce_startup: true,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_snapshot_limit() -> usize {
    DEFAULT_SNAPSHOT_LIMIT
}
fn default_subscriber_buffer() -> usize {
    DEFAULT_SUBSCRIBER_BUFFER
}
fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}
fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}
fn default_channel() -> String {
    DEFAULT_FANOUT_CHANNEL.to_string()
}
fn default_reconnect_base_ms() -> u64 {
    500
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_fanout_timeout_ms() -> u64 {
    DEFAULT_FANOUT_TIMEOUT_MS
}
fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}

impl HeraldConfig {
    /// Load config from a TOML file with HERALD_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `HERALD_BROADCAST__HISTORY_CAPACITY=500`. A missing file is not an
    /// error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: HeraldConfig = Figment::from(Serialized::defaults(HeraldConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HERALD_").split("__"))
            .extract()
            .map_err(|e| crate::error::HeraldError::Config(e.to_string()))?;

        config.broadcast = config.broadcast.normalized();
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.herald/herald.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = HeraldConfig::default();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.broadcast.history_capacity, 100);
        assert_eq!(config.broadcast.snapshot_limit, 10);
        assert_eq!(config.fanout.backend, FanoutBackend::None);
        assert_eq!(config.fanout.channel, "sse-events");
        assert_eq!(config.ticker.interval_secs, 10);
        assert_eq!(config.fanout.timeout_ms, 2_000);
    }

    #[test]
    fn normalized_clamps_snapshot_and_buffer() {
        let cfg = BroadcastConfig {
            history_capacity: 3,
            snapshot_limit: 10,
            subscriber_buffer: 0,
            keep_alive_secs: 15,
        }
        .normalized();
        assert_eq!(cfg.snapshot_limit, 3);
        assert_eq!(cfg.subscriber_buffer, MIN_SUBSCRIBER_BUFFER);
    }

    #[test]
    fn buffer_floor_leaves_room_past_the_handshake() {
        // connected + history, and at least two live events before the first drain
        let cfg = BroadcastConfig {
            subscriber_buffer: 2,
            ..BroadcastConfig::default()
        }
        .normalized();
        assert_eq!(cfg.subscriber_buffer, 4);
    }

    #[test]
    fn normalized_never_allows_zero_capacity() {
        let cfg = BroadcastConfig {
            history_capacity: 0,
            snapshot_limit: 0,
            ..BroadcastConfig::default()
        }
        .normalized();
        assert_eq!(cfg.history_capacity, 1);
        assert_eq!(cfg.snapshot_limit, 1);
    }

    #[test]
    fn load_merges_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "herald.toml",
                r#"
                [gateway]
                port = 4000

                [broadcast]
                history_capacity = 5

                [fanout]
                backend = "redis"
                channel = "events-test"
                "#,
            )?;
            jail.set_env("HERALD_GATEWAY__BIND", "127.0.0.1");
            jail.set_env("HERALD_TICKER__INTERVAL_SECS", "0");

            let config = HeraldConfig::load(Some("herald.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.gateway.port, 4000);
            assert_eq!(config.gateway.bind, "127.0.0.1");
            assert_eq!(config.broadcast.history_capacity, 5);
            assert_eq!(config.broadcast.snapshot_limit, 5);
            assert_eq!(config.fanout.backend, FanoutBackend::Redis);
            assert_eq!(config.fanout.channel, "events-test");
            assert_eq!(config.ticker.interval_secs, 0);
            Ok(())
        });
    }

    #[test]
    fn load_without_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config =
                HeraldConfig::load(Some("does-not-exist.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.gateway.port, DEFAULT_PORT);
            assert!(config.gateway.cors);
            Ok(())
        });
    }
}
