//! Simulation request

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};

/// Default number of trials
pub const DEFAULT_NUM_SIMS: u64 = 100_000;
/// Default worker count
pub const DEFAULT_THREAD_COUNT: usize = 10;
/// Default trials per batch
pub const DEFAULT_BATCH_SIZE: u64 = 50_000;

/// What to simulate and how to split it
///
/// `game_id` and `mode` are opaque to the engine; they only address output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Game identifier (e.g. `0_0_lines`)
    pub game_id: String,
    /// Bet mode (e.g. `base`)
    pub mode: String,
    /// Total number of trials
    pub num_sims: u64,
    /// Worker count (one partition per worker)
    pub thread_count: usize,
    /// Trials per batch
    pub batch_size: u64,
    /// Compress persisted batches
    pub compress: bool,
}

impl SimulationRequest {
    /// Create a request with default sizing
    pub fn new<G: Into<String>, M: Into<String>>(game_id: G, mode: M) -> Self {
        Self {
            game_id: game_id.into(),
            mode: mode.into(),
            num_sims: DEFAULT_NUM_SIMS,
            thread_count: DEFAULT_THREAD_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            compress: true,
        }
    }

    /// Set total trial count
    pub fn with_sims(mut self, num_sims: u64) -> Self {
        self.num_sims = num_sims;
        self
    }

    /// Set worker count
    pub fn with_threads(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable compression
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Check the partitioning invariants
    pub fn validate(&self) -> CoreResult<()> {
        if self.game_id.is_empty() {
            return Err(ValidationError::Empty { field: "game_id" });
        }
        if self.mode.is_empty() {
            return Err(ValidationError::Empty { field: "mode" });
        }
        if self.num_sims == 0 {
            return Err(ValidationError::Zero { field: "num_sims" });
        }
        if self.thread_count == 0 {
            return Err(ValidationError::Zero { field: "thread_count" });
        }
        if self.batch_size == 0 {
            return Err(ValidationError::Zero { field: "batch_size" });
        }

        let threads = self.thread_count as u64;
        if self.num_sims % threads != 0 {
            return Err(ValidationError::SimsNotDivisibleByThreads {
                num_sims: self.num_sims,
                thread_count: self.thread_count,
            });
        }

        let per_thread = self.num_sims / threads;
        if per_thread % self.batch_size != 0 {
            return Err(ValidationError::PerThreadNotDivisibleByBatch {
                per_thread,
                batch_size: self.batch_size,
            });
        }

        Ok(())
    }

    /// Trials owned by each worker (only meaningful once validated)
    pub fn sims_per_thread(&self) -> u64 {
        if self.thread_count == 0 {
            0
        } else {
            self.num_sims / self.thread_count as u64
        }
    }

    /// Batches each worker executes (only meaningful once validated)
    pub fn batches_per_thread(&self) -> u64 {
        if self.batch_size == 0 {
            0
        } else {
            self.sims_per_thread() / self.batch_size
        }
    }
}
