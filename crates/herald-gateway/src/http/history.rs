//! GET /history?limit=N: recent events from this instance's buffer.

use axum::{
    extract::{Query, State},
    Json,
};
use herald_protocol::HistoryItem;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Kept as text: anything that is not a positive integer falls back to
    /// the configured default instead of rejecting the request.
    pub limit: Option<String>,
}

impl HistoryQuery {
    pub fn limit(&self) -> Option<usize> {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
    }
}

/// Items are oldest first.
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let history: Vec<HistoryItem> = state
        .broadcaster
        .history(query.limit())
        .iter()
        .map(|event| event.to_history_item())
        .collect();

    Json(json!({
        "success": true,
        "count": history.len(),
        "history": history,
    }))
}
