use std::io;
use thiserror::Error;

/// Errors reported by a storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error while reading storage files
    #[error("Storage IO error: {0}")]
    Io(#[from] io::Error),

    /// Unknown file, dataset or series name
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or unevaluable expression
    #[error("Expression error: {0}")]
    Expression(String),

    /// Engine-specific failure
    #[error("Engine error: {0}")]
    Engine(String),
}

impl StorageError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }
}
