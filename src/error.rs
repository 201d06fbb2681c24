use thiserror::Error;

/// Location tracker error types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Position filter has not absorbed a measurement yet")]
    NotInitialized,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;
