//! Run report and run state

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sb_core::{Batch, Partition, RunPlan};

use crate::worker::ThreadOutcome;

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Planning,
    /// Request failed validation; nothing ran
    Rejected,
    Running,
    Aggregating,
    /// Every partition fully persisted
    Succeeded,
    /// All workers joined, at least one failed or was cancelled
    PartialFailure,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl RunState {
    /// Terminal state?
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Rejected | Self::Succeeded | Self::PartialFailure)
    }
}

/// Aggregate of every worker's outcome
///
/// Built once after all workers have joined.
#[derive(Debug)]
pub struct RunReport {
    /// True iff every partition was fully persisted
    pub succeeded: bool,
    /// Workers that stopped on an error, ordered by thread id
    pub failures: Vec<ThreadOutcome>,
    /// Workers stopped early by fail-fast cancellation, ordered by thread id
    pub cancelled: Vec<ThreadOutcome>,
    /// Workers that finished their whole partition, ordered by thread id
    pub completed: Vec<ThreadOutcome>,
    /// Wall-clock time from worker launch to join
    pub elapsed: Duration,
}

/// Address of a batch that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub thread_id: usize,
    /// None when the worker's kernel could not be created
    pub batch_index: Option<usize>,
    pub trial_index: Option<u64>,
}

impl RunReport {
    /// Aggregate outcomes
    pub fn from_outcomes(outcomes: Vec<ThreadOutcome>, elapsed: Duration) -> Self {
        let mut failures = Vec::new();
        let mut cancelled = Vec::new();
        let mut completed = Vec::new();

        for outcome in outcomes {
            if outcome.error.is_some() {
                failures.push(outcome);
            } else if outcome.cancelled {
                cancelled.push(outcome);
            } else {
                completed.push(outcome);
            }
        }

        failures.sort_by_key(|o| o.thread_id);
        cancelled.sort_by_key(|o| o.thread_id);
        completed.sort_by_key(|o| o.thread_id);

        Self {
            succeeded: failures.is_empty() && cancelled.is_empty(),
            failures,
            cancelled,
            completed,
            elapsed,
        }
    }

    /// Terminal run state
    pub fn state(&self) -> RunState {
        if self.succeeded {
            RunState::Succeeded
        } else {
            RunState::PartialFailure
        }
    }

    /// Every outcome, ordered by thread id
    pub fn outcomes(&self) -> Vec<&ThreadOutcome> {
        let mut all: Vec<&ThreadOutcome> = self
            .failures
            .iter()
            .chain(&self.cancelled)
            .chain(&self.completed)
            .collect();
        all.sort_by_key(|o| o.thread_id);
        all
    }

    /// Number of workers
    pub fn thread_count(&self) -> usize {
        self.failures.len() + self.cancelled.len() + self.completed.len()
    }

    /// Trials simulated and written by this run
    pub fn trials_simulated(&self) -> u64 {
        self.outcomes().iter().map(|o| o.trials_simulated).sum()
    }

    /// Batches written by this run
    pub fn batches_completed(&self) -> usize {
        self.outcomes().iter().map(|o| o.batches_completed).sum()
    }

    /// Batches skipped on resume
    pub fn batches_skipped(&self) -> usize {
        self.outcomes().iter().map(|o| o.batches_skipped).sum()
    }

    /// Failing batches, ordered by thread id
    pub fn failed_batches(&self) -> Vec<FailedBatch> {
        self.failures
            .iter()
            .filter_map(|o| o.error.as_ref())
            .map(|err| FailedBatch {
                thread_id: err.thread_id(),
                batch_index: err.batch_index(),
                trial_index: err.trial_index(),
            })
            .collect()
    }

    /// Batches with no persisted output: the failing batch and everything
    /// after it in failed or cancelled partitions
    pub fn unfinished_batches<'p>(&self, plan: &'p RunPlan) -> Vec<(&'p Partition, Batch)> {
        let mut unfinished = Vec::new();
        for outcome in self.failures.iter().chain(&self.cancelled) {
            if let Some(partition) = plan.partitions.get(outcome.thread_id) {
                for batch in partition.batches().skip(outcome.batches_accounted()) {
                    unfinished.push((partition, batch));
                }
            }
        }
        unfinished.sort_by_key(|(_, b)| b.start_index);
        unfinished
    }

    /// Serializable summary
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            succeeded: self.succeeded,
            state: self.state(),
            elapsed_secs: self.elapsed.as_secs_f64(),
            thread_count: self.thread_count(),
            trials_simulated: self.trials_simulated(),
            batches_completed: self.batches_completed(),
            batches_skipped: self.batches_skipped(),
            failures: self
                .failures
                .iter()
                .map(|o| FailureSummary {
                    thread_id: o.thread_id,
                    batch_index: o.error.as_ref().and_then(|e| e.batch_index()),
                    trial_index: o.error.as_ref().and_then(|e| e.trial_index()),
                    error: o.error.as_ref().map(ToString::to_string).unwrap_or_default(),
                })
                .collect(),
            cancelled_threads: self.cancelled.iter().map(|o| o.thread_id).collect(),
        }
    }
}

/// JSON-friendly view of a [`RunReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub succeeded: bool,
    pub state: RunState,
    pub elapsed_secs: f64,
    pub thread_count: usize,
    pub trials_simulated: u64,
    pub batches_completed: usize,
    pub batches_skipped: usize,
    pub failures: Vec<FailureSummary>,
    pub cancelled_threads: Vec<usize>,
}

/// One failed worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub thread_id: usize,
    pub batch_index: Option<usize>,
    pub trial_index: Option<u64>,
    pub error: String,
}

impl ReportSummary {
    /// Pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
