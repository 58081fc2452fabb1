//! Batch persistence contract

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::book::Book;
use crate::error::WriteError;
use crate::plan::{Batch, Partition};
use crate::request::SimulationRequest;

/// Address of one batch in the output namespace
///
/// Unique per batch within a run: `(thread_id, batch_index)` never repeats,
/// so concurrent workers never target the same location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchKey {
    pub game_id: String,
    pub mode: String,
    pub thread_id: usize,
    pub batch_index: usize,
    /// First global trial index of the batch
    pub start_index: u64,
    /// Trials in the batch
    pub size: u64,
}

impl BatchKey {
    pub fn new(request: &SimulationRequest, partition: &Partition, batch: &Batch) -> Self {
        Self {
            game_id: request.game_id.clone(),
            mode: request.mode.clone(),
            thread_id: partition.thread_id,
            batch_index: batch.batch_index,
            start_index: batch.start_index,
            size: batch.size,
        }
    }

    /// Global trial range covered by the batch
    pub fn trials(&self) -> Range<u64> {
        self.start_index..self.start_index + self.size
    }

    /// File stem used by file-backed writers
    pub fn file_stem(&self) -> String {
        format!("books_{}_{}_{}", self.mode, self.thread_id, self.batch_index)
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} thread {} batch {} (trials {}-{})",
            self.game_id,
            self.mode,
            self.thread_id,
            self.batch_index,
            self.start_index,
            self.start_index + self.size.saturating_sub(1)
        )
    }
}

/// Persists completed batches
///
/// Called concurrently from every worker, always with distinct keys.
/// Ownership of the books moves into the writer; the engine keeps nothing.
pub trait OutputWriter: Send + Sync {
    /// Persist one fully simulated batch
    ///
    /// Must leave no visible output for `key` when it fails.
    fn write(&self, key: &BatchKey, books: Vec<Book>, compress: bool) -> Result<(), WriteError>;

    /// Is this exact batch (same trial range, same encoding) already
    /// persisted? Used to skip work on resume.
    fn contains(&self, _key: &BatchKey, _compress: bool) -> bool {
        false
    }
}

impl<W: OutputWriter + ?Sized> OutputWriter for &W {
    fn write(&self, key: &BatchKey, books: Vec<Book>, compress: bool) -> Result<(), WriteError> {
        (**self).write(key, books, compress)
    }

    fn contains(&self, key: &BatchKey, compress: bool) -> bool {
        (**self).contains(key, compress)
    }
}

impl<W: OutputWriter + ?Sized> OutputWriter for std::sync::Arc<W> {
    fn write(&self, key: &BatchKey, books: Vec<Book>, compress: bool) -> Result<(), WriteError> {
        (**self).write(key, books, compress)
    }

    fn contains(&self, key: &BatchKey, compress: bool) -> bool {
        (**self).contains(key, compress)
    }
}
