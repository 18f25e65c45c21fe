use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check with instance and fanout metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let broadcaster = &state.broadcaster;
    let fanout = match broadcaster.fanout_name() {
        Some(name) => json!({
            "backend": name,
            "channel": broadcaster.channel(),
            "status": broadcaster.fanout_status(),
        }),
        None => json!({ "backend": "none" }),
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build": env!("HERALD_BUILD"),
        "serverId": broadcaster.instance_id(),
        "clients": broadcaster.subscriber_count(),
        "historyLen": broadcaster.history_len(),
        "fanout": fanout,
    }))
}
