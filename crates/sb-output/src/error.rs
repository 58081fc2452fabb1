//! Error types for book persistence

use thiserror::Error;

/// Errors reading, publishing or describing persisted books
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Batch file missing: {0}")]
    MissingBatch(String),

    #[error("Invalid book data: {0}")]
    InvalidData(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
