//! POST /send: publish an event from an HTTP producer.

use axum::{extract::State, http::StatusCode, Json};
use herald_broadcast::transport_error;
use herald_core::HeraldError;
use herald_protocol::names;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default = "default_event")]
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_event() -> String {
    names::DEFAULT_EVENT_TYPE.to_string()
}

/// Returns 200 with the delivery receipt, or 400 `{error, code}` when the
/// event type is blank or `data` is missing. A fanout failure still returns
/// 200: the event reached local subscribers and history, and the body says
/// it was not propagated.
pub async fn send_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let receipt = state
        .broadcaster
        .publish(&req.event, req.data)
        .await
        .map_err(|e| {
            let err = HeraldError::from(e);
            warn!(event = %req.event, error = %err, "publish rejected");
            error_response(StatusCode::BAD_REQUEST, &err)
        })?;

    let mut body = json!({
        "success": true,
        "clientCount": state.broadcaster.subscriber_count(),
        "delivered": receipt.delivered,
        "serverId": state.broadcaster.instance_id(),
        "eventType": receipt.event.event_type,
        "timestamp": receipt.event.timestamp,
        "propagated": receipt.propagated(),
    });
    if let Some(err) = &receipt.fanout_error {
        let err = transport_error(err);
        body["fanoutError"] = json!({ "error": err.to_string(), "code": err.code() });
    }

    Ok(Json(body))
}

pub fn error_response(status: StatusCode, err: &HeraldError) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "error": err.to_string(), "code": err.code() })),
    )
}
