use serde::Serialize;

/// Runtime connection state of a fanout transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutStatus {
    /// Fully connected and ready to publish.
    Connected,

    /// Not yet connected, or re-establishing the connection.
    Connecting,

    /// The last operation failed; local delivery continues without peers.
    Error(String),
}
