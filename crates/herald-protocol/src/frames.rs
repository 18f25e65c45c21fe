use herald_core::{InstanceId, SubscriberId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::Event;
use crate::names;

/// One unit delivered to a subscriber.
/// SSE: `id: 42\nevent: message\ndata: {"text":"hi"}\n\n`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonic per-instance token.
    pub id: u64,
    pub event: String,
    /// Serialized JSON body.
    pub data: String,
}

impl Frame {
    pub fn new(id: u64, event: impl Into<String>, body: &impl Serialize) -> Self {
        Self {
            id,
            event: event.into(),
            data: serde_json::to_string(body).unwrap_or_default(),
        }
    }

    pub fn connected(id: u64, notice: &ConnectedNotice) -> Self {
        Self::new(id, names::CONNECTED, notice)
    }

    pub fn history(id: u64, snapshot: &HistorySnapshot) -> Self {
        Self::new(id, names::HISTORY, snapshot)
    }

    /// Live event: the frame name is the event type, the body is the bare payload.
    pub fn event(id: u64, event: &Event) -> Self {
        Self::new(id, event.event_type.clone(), &event.payload)
    }
}

/// Body of the `connected` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNotice {
    pub message: String,
    pub client_id: SubscriberId,
    pub server_id: InstanceId,
}

impl ConnectedNotice {
    pub fn new(client_id: SubscriberId, server_id: InstanceId) -> Self {
        Self {
            message: "connection established".to_string(),
            client_id,
            server_id,
        }
    }
}

/// One replayed event, as rendered by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub event_type: String,
    pub data: Value,
    pub timestamp: i64,
}

/// Body of the `history` frame. Items are oldest-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub items: Vec<HistoryItem>,
    pub count: usize,
}

impl HistorySnapshot {
    pub fn new(items: Vec<HistoryItem>) -> Self {
        let count = items.len();
        Self { items, count }
    }
}

impl<'a> FromIterator<&'a Event> for HistorySnapshot {
    fn from_iter<I: IntoIterator<Item = &'a Event>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Event::to_history_item).collect())
    }
}
