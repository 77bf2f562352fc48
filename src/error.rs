use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Task pool is stopped and no longer accepts tasks")]
    PoolStopped,

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Source failed: {source_name} - {message}")]
    SourceError {
        source_name: String,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {context} - {message}")]
    ParseError {
        context: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File error: {path:?} - {message}")]
    FileError {
        path: PathBuf,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl ScrapeError {
    /// Wrap an error raised inside a named source
    pub fn source_failure(source_name: &str, error: impl std::fmt::Display) -> Self {
        ScrapeError::SourceError {
            source_name: source_name.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<anyhow::Error> for ScrapeError {
    fn from(error: anyhow::Error) -> Self {
        ScrapeError::UnexpectedError(format!("{:#}", error))
    }
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
