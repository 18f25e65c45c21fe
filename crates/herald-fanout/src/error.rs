use thiserror::Error;

/// Errors that can occur within any fanout transport.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// The underlying transport could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A message could not be handed to the transport.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// A subscription could not be opened.
    #[error("Subscribe failed: {0}")]
    Subscribe(String),
}
