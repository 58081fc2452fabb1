//! Deterministic work partitioning
//!
//! `[0, num_sims)` is cut into `thread_count` contiguous partitions of equal
//! size, and every partition into contiguous batches of `batch_size` trials.
//! The same request always yields the same plan, so a failed batch can be
//! re-targeted by `(thread_id, batch_index)` on a later run.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::request::SimulationRequest;

/// One unit of persisted work inside a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Batch {
    /// Index within the owning partition (0-based)
    pub batch_index: usize,
    /// First global trial index (inclusive)
    pub start_index: u64,
    /// Number of trials
    pub size: u64,
}

impl Batch {
    /// One past the last trial index
    pub fn end_index(&self) -> u64 {
        self.start_index + self.size
    }

    /// Global trial indices, ascending
    pub fn trials(&self) -> Range<u64> {
        self.start_index..self.end_index()
    }
}

/// Contiguous trial range owned by one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Worker id (0-based)
    pub thread_id: usize,
    /// First global trial index (inclusive)
    pub start_index: u64,
    /// Number of trials (`num_sims / thread_count`)
    pub trial_count: u64,
    /// Trials per batch
    pub batch_size: u64,
}

impl Partition {
    /// One past the last trial index
    pub fn end_index(&self) -> u64 {
        self.start_index + self.trial_count
    }

    /// Global trial indices, ascending
    pub fn trials(&self) -> Range<u64> {
        self.start_index..self.end_index()
    }

    /// Does this partition own the trial?
    pub fn contains(&self, trial_index: u64) -> bool {
        self.trials().contains(&trial_index)
    }

    /// Number of batches
    pub fn batch_count(&self) -> usize {
        self.trial_count.checked_div(self.batch_size).unwrap_or(0) as usize
    }

    /// Batch by index within the partition
    pub fn batch(&self, batch_index: usize) -> Option<Batch> {
        if batch_index >= self.batch_count() {
            return None;
        }
        Some(Batch {
            batch_index,
            start_index: self.start_index + batch_index as u64 * self.batch_size,
            size: self.batch_size,
        })
    }

    /// Batches in ascending order, derived on demand
    pub fn batches(&self) -> impl Iterator<Item = Batch> {
        (0..self.batch_count()).filter_map(move |i| self.batch(i))
    }
}

/// Validated split of a request into partitions and batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Total trials
    pub num_sims: u64,
    /// Trials per batch
    pub batch_size: u64,
    /// One partition per worker, ordered by thread id
    pub partitions: Vec<Partition>,
}

impl RunPlan {
    /// Number of workers
    pub fn thread_count(&self) -> usize {
        self.partitions.len()
    }

    /// Total number of batches across all partitions
    pub fn batch_count(&self) -> usize {
        self.partitions.iter().map(Partition::batch_count).sum()
    }

    /// Look up a batch by its address
    pub fn batch(&self, thread_id: usize, batch_index: usize) -> Option<Batch> {
        self.partitions
            .get(thread_id)
            .and_then(|p| p.batch(batch_index))
    }

    /// All `(partition, batch)` pairs in global trial order
    pub fn iter_batches(&self) -> impl Iterator<Item = (&Partition, Batch)> {
        self.partitions
            .iter()
            .flat_map(|p| p.batches().map(move |b| (p, b)))
    }

    /// Partition owning a trial
    pub fn partition_of(&self, trial_index: u64) -> Option<&Partition> {
        if trial_index >= self.num_sims {
            return None;
        }
        let per_thread = self.partitions.first()?.trial_count;
        self.partitions.get((trial_index / per_thread) as usize)
    }
}

/// Compute the partition/batch plan for a request
///
/// Pure: no IO, no randomness. Memory is one [`Partition`] per thread;
/// batches are derived from the partition when iterated, so the plan size
/// does not grow with the number of batches.
pub fn plan(request: &SimulationRequest) -> CoreResult<RunPlan> {
    request.validate()?;

    let per_thread = request.sims_per_thread();
    let partitions = (0..request.thread_count)
        .map(|thread_id| Partition {
            thread_id,
            start_index: thread_id as u64 * per_thread,
            trial_count: per_thread,
            batch_size: request.batch_size,
        })
        .collect();

    Ok(RunPlan {
        num_sims: request.num_sims,
        batch_size: request.batch_size,
        partitions,
    })
}
