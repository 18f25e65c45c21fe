use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Fanout transport error: {0}")]
    Transport(String),
}

impl HeraldError {
    /// Short error code string sent to clients in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            HeraldError::Config(_) => "CONFIG_ERROR",
            HeraldError::InvalidInput(_) => "INVALID_INPUT",
            HeraldError::Transport(_) => "TRANSPORT_FAILURE",
        }
    }
}

pub type Result<T> = std::result::Result<T, HeraldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(HeraldError::Config("bad".into()).code(), "CONFIG_ERROR");
        assert_eq!(
            HeraldError::InvalidInput("x".into()).code(),
            "INVALID_INPUT"
        );
        assert_eq!(
            HeraldError::Transport("down".into()).code(),
            "TRANSPORT_FAILURE"
        );
    }

    #[test]
    fn display_carries_detail() {
        let err = HeraldError::Transport("redis unreachable".into());
        assert_eq!(err.to_string(), "Fanout transport error: redis unreachable");
    }
}
