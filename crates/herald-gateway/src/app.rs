use axum::{
    routing::{get, post},
    Router,
};
use herald_broadcast::Broadcaster;
use herald_core::HeraldConfig;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: HeraldConfig,
    pub broadcaster: Arc<Broadcaster>,
    /// Flips to `true` on shutdown; open event streams end when it does.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        config: HeraldConfig,
        broadcaster: Arc<Broadcaster>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            broadcaster,
            shutdown,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = state.config.gateway.cors;

    let router = Router::new()
        .route("/", get(crate::http::ui::ui_handler))
        .route("/events", get(crate::http::events::events_handler))
        .route("/send", post(crate::http::send::send_handler))
        .route("/history", get(crate::http::history::history_handler))
        .route("/health", get(crate::http::health::health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
