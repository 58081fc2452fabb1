//! Error types for the simulation engine

use thiserror::Error;

use sb_core::{KernelError, ValidationError, WriteError};

/// Failure of one batch, tagged with where it happened
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("thread {thread_id} batch {batch_index}: trial {trial_index} failed: {source}")]
    Kernel {
        thread_id: usize,
        batch_index: usize,
        trial_index: u64,
        #[source]
        source: KernelError,
    },

    #[error("thread {thread_id} batch {batch_index}: write failed: {source}")]
    Write {
        thread_id: usize,
        batch_index: usize,
        #[source]
        source: WriteError,
    },

    #[error("thread {thread_id}: {source}")]
    KernelSetup {
        thread_id: usize,
        #[source]
        source: KernelError,
    },

    /// Panic outside a trial or write, e.g. in an observer callback
    #[error("thread {thread_id}: worker panicked: {message}")]
    WorkerPanicked { thread_id: usize, message: String },
}

impl BatchError {
    /// Worker the failure belongs to
    pub fn thread_id(&self) -> usize {
        match self {
            Self::Kernel { thread_id, .. }
            | Self::Write { thread_id, .. }
            | Self::KernelSetup { thread_id, .. }
            | Self::WorkerPanicked { thread_id, .. } => *thread_id,
        }
    }

    /// Failing batch (None if the worker never started a batch)
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            Self::Kernel { batch_index, .. } | Self::Write { batch_index, .. } => {
                Some(*batch_index)
            }
            Self::KernelSetup { .. } | Self::WorkerPanicked { .. } => None,
        }
    }

    /// Failing trial (kernel failures only)
    pub fn trial_index(&self) -> Option<u64> {
        match self {
            Self::Kernel { trial_index, .. } => Some(*trial_index),
            _ => None,
        }
    }
}

/// Run-level errors: nothing was executed
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
