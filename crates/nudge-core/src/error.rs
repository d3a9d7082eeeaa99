use thiserror::Error;

/// Top-level error type for the reminder core.
///
/// Subsystem crates define their own error types and implement
/// `From<NudgeError>` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NudgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Calendar sync error: {0}")]
    CalendarSync(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for NudgeError {
    fn from(err: toml::de::Error) -> Self {
        NudgeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for NudgeError {
    fn from(err: toml::ser::Error) -> Self {
        NudgeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for NudgeError {
    fn from(err: serde_json::Error) -> Self {
        NudgeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for core operations.
pub type Result<T> = std::result::Result<T, NudgeError>;
