use thiserror::Error;

/// Top-level error type for the Herald runtime.
#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("event bus closed: {0}")]
    ChannelClosed(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
