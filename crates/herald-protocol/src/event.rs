use herald_core::InstanceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frames::HistoryItem;

/// An immutable, timestamped, typed payload broadcast to subscribers.
///
/// This is also the fanout wire message.
/// Wire: `{ "serverId": "…", "eventType": "message", "payload": {...}, "timestamp": 1700000000000 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    pub payload: Value,
    /// Milliseconds since the Unix epoch, strictly increasing per origin instance.
    pub timestamp: i64,
    /// Instance that first accepted the publish.
    #[serde(rename = "serverId")]
    pub origin: InstanceId,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        payload: Value,
        timestamp: i64,
        origin: InstanceId,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp,
            origin,
        }
    }

    /// Serialize for the fanout transport.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a message received from the fanout transport.
    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn is_from(&self, instance: &InstanceId) -> bool {
        &self.origin == instance
    }

    /// Shape used by `history` frames and the history endpoint.
    pub fn to_history_item(&self) -> HistoryItem {
        HistoryItem {
            event_type: self.event_type.clone(),
            data: self.payload.clone(),
            timestamp: self.timestamp,
        }
    }
}
