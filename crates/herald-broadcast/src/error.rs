use herald_core::HeraldError;
use herald_fanout::FanoutError;
use thiserror::Error;

/// Errors returned synchronously by broadcast operations.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Empty event type or missing payload. Nothing was applied.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, BroadcastError>;

/// Why a subscriber was dropped during delivery. Never surfaced to producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscriberWriteFailure {
    /// Outbound queue full: the subscriber is not keeping up.
    #[error("outbound queue full")]
    QueueFull,

    /// The connection side of the queue is gone.
    #[error("connection closed")]
    Closed,
}

impl From<BroadcastError> for HeraldError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::InvalidInput(reason) => HeraldError::InvalidInput(reason),
        }
    }
}

/// Transport failures only reach callers as a secondary status on publish.
pub fn transport_error(err: &FanoutError) -> HeraldError {
    HeraldError::Transport(err.to_string())
}
