// Well-known SSE event names; they must match what EventSource clients listen for.

/// First frame on every stream.
pub const CONNECTED: &str = "connected";
/// Replay of recent events, sent once right after `connected`.
pub const HISTORY: &str = "history";

/// Event type used when a producer does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "message";

// server-originated events
pub const UPDATE: &str = "update";
pub const SYSTEM: &str = "system";

