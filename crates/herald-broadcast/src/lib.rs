//! Multi-instance broadcast engine.
//!
//! ```text
//!   producer ──► Broadcaster::publish ──┬─► HistoryBuffer::append
//!                                       ├─► LocalRegistry::deliver_all ──► subscriber queues
//!                                       └─► Fanout::publish (tagged with origin)
//!
//!   Fanout ──► listener task ──► Broadcaster::on_fanout_message
//!                                  (own origin → dropped, else append + deliver_all)
//! ```

pub mod broadcaster;
pub mod error;
pub mod history;
pub mod listener;
pub mod registry;

pub use broadcaster::{validate_event_type, Broadcaster, PublishReceipt, RelayOutcome, Subscription};
pub use error::{transport_error, BroadcastError, Result, SubscriberWriteFailure};
pub use history::HistoryBuffer;
pub use listener::spawn_fanout_listener;
pub use registry::{FrameSender, LocalRegistry, Subscriber};
