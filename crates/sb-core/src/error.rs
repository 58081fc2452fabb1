//! Error types shared by the engine and its collaborators

use thiserror::Error;

/// Request rejected before any work starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("sims not divisible by threads ({num_sims} % {thread_count} != 0)")]
    SimsNotDivisibleByThreads { num_sims: u64, thread_count: usize },

    #[error(
        "per-thread sims not divisible by batch size ({per_thread} % {batch_size} != 0)"
    )]
    PerThreadNotDivisibleByBatch { per_thread: u64, batch_size: u64 },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

impl ValidationError {
    /// Short, stable reason string (without the numbers)
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Zero { .. } => "parameter must be greater than zero",
            Self::SimsNotDivisibleByThreads { .. } => "sims not divisible by threads",
            Self::PerThreadNotDivisibleByBatch { .. } => {
                "per-thread sims not divisible by batch size"
            }
            Self::Empty { .. } => "parameter must not be empty",
        }
    }
}

/// A single trial failed inside the simulation kernel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("trial failed: {0}")]
    Failed(String),

    #[error("kernel panicked: {0}")]
    Panicked(String),

    #[error("kernel setup failed: {0}")]
    Setup(String),
}

/// Persisting a completed batch failed
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Batch already written: {0}")]
    Duplicate(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Result type alias
pub type CoreResult<T> = Result<T, ValidationError>;
