pub mod backoff;
pub mod error;
pub mod fanout;
pub mod memory;
pub mod redis_pubsub;
pub mod types;

pub use backoff::Backoff;
pub use error::FanoutError;
pub use fanout::{Fanout, MessageStream};
pub use memory::MemoryFanout;
pub use redis_pubsub::RedisFanout;
pub use types::FanoutStatus;
