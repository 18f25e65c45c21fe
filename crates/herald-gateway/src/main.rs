use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use herald_broadcast::{spawn_fanout_listener, Broadcaster};
use herald_core::{
    config::{FanoutBackend, FanoutConfig},
    HeraldConfig, InstanceId,
};
use herald_fanout::{Backoff, Fanout, RedisFanout};
use tokio::sync::watch;
use tracing::{info, warn};

mod app;
mod http;
mod ticker;

/// Multi-instance Server-Sent-Events broadcast gateway.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file (default: ~/.herald/herald.toml).
    #[arg(long, env = "HERALD_CONFIG")]
    config: Option<String>,

    /// Listen port, overrides `gateway.port`.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Bind address, overrides `gateway.bind`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "herald_gateway=info,herald_broadcast=info,herald_fanout=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: --config / HERALD_CONFIG > ~/.herald/herald.toml
    let mut config = HeraldConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        HeraldConfig::default()
    });
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.bind = bind;
    }

    let instance_id = InstanceId::generate();
    info!(server_id = %instance_id, "starting herald instance");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // fanout is optional: without it the instance serves only its own subscribers
    let mut broadcaster = Broadcaster::new(instance_id, config.broadcast.clone())
        .with_publish_timeout(Duration::from_millis(config.fanout.timeout_ms));
    let fanout = build_fanout(&config.fanout);
    if let Some(fanout) = &fanout {
        broadcaster = broadcaster.with_fanout(Arc::clone(fanout), config.fanout.channel.clone());
    }
    let broadcaster = Arc::new(broadcaster);

    let listener_task = fanout.map(|fanout| {
        spawn_fanout_listener(
            Arc::clone(&broadcaster),
            fanout,
            config.fanout.channel.clone(),
            Backoff::from_millis(config.fanout.reconnect_base_ms, config.fanout.reconnect_max_ms),
            shutdown_rx.clone(),
        )
    });

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // server-originated events start once the port is open
    let ticker_task =
        ticker::start(Arc::clone(&broadcaster), &config.ticker, shutdown_rx.clone());

    let state = Arc::new(app::AppState::new(
        config,
        Arc::clone(&broadcaster),
        shutdown_rx,
    ));
    let router = app::build_router(state);

    info!(server_id = %broadcaster.instance_id(), "Herald gateway listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // ends open event streams as well as the background tasks
            let _ = shutdown_tx.send(true);
        })
        .await?;

    for task in [listener_task, ticker_task].into_iter().flatten() {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    info!("Herald gateway stopped");
    Ok(())
}

/// Pick the fanout transport from config. A Redis URL that does not parse
/// leaves the instance in standalone mode rather than refusing to start.
fn build_fanout(config: &FanoutConfig) -> Option<Arc<dyn Fanout>> {
    match config.backend {
        FanoutBackend::None => {
            info!("fanout disabled, running standalone");
            None
        }
        FanoutBackend::Redis => match RedisFanout::new(&config.url) {
            Ok(redis) => {
                info!(url = %config.url, channel = %config.channel, "using Redis fanout");
                Some(Arc::new(
                    redis.with_timeout(Duration::from_millis(config.timeout_ms)),
                ))
            }
            Err(e) => {
                warn!(url = %config.url, error = %e, "invalid Redis URL, running standalone");
                None
            }
        },
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => warn!(error = %e, "failed to listen for shutdown signal"),
    }
}
