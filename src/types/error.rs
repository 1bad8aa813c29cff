use thiserror::Error;

/// wrapstats error types
#[derive(Error, Debug)]
pub enum WrapError {
    /// Failed to parse JSON or an upstream response
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Saving or loading a month record failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for wrapstats
pub type Result<T> = std::result::Result<T, WrapError>;
