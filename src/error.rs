use thiserror::Error;

/// Route tracker error types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Trip already running")]
    AlreadyRunning,

    #[error("Trip not running")]
    NotRunning,

    #[error("Invalid trip state: {0}")]
    InvalidState(String),

    #[error("Innovation covariance is singular")]
    SingularInnovation,

    #[error("Non-finite value in {0}")]
    NonFinite(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;
