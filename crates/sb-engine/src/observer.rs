//! Run observers
//!
//! The orchestrator reports progress through an injected [`RunObserver`]
//! instead of logging from worker code directly. Observers are called from
//! every worker thread concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use sb_core::{BatchKey, Partition, RunPlan, SimulationRequest};

use crate::report::RunReport;
use crate::worker::ThreadOutcome;

/// Receives run lifecycle events
pub trait RunObserver: Send + Sync {
    fn run_started(&self, _request: &SimulationRequest, _plan: &RunPlan) {}

    fn thread_started(&self, _partition: &Partition) {}

    /// A batch was simulated and written
    fn batch_completed(&self, _key: &BatchKey, _batches_in_partition: usize) {}

    /// A batch was already persisted and skipped (resume)
    fn batch_skipped(&self, _key: &BatchKey) {}

    fn thread_finished(&self, _outcome: &ThreadOutcome) {}

    fn run_finished(&self, _report: &RunReport) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl RunObserver for NullObserver {}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG OBSERVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Default batch progress interval
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

/// Forwards run events to the `log` facade
#[derive(Debug, Clone)]
pub struct LogObserver {
    progress_every: usize,
}

impl Default for LogObserver {
    fn default() -> Self {
        Self {
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log batch progress every `n` batches per thread
    pub fn with_progress_every(mut self, n: usize) -> Self {
        self.progress_every = n.max(1);
        self
    }
}

impl RunObserver for LogObserver {
    fn run_started(&self, request: &SimulationRequest, plan: &RunPlan) {
        log::info!(
            "Running {} simulations for {}/{} with {} threads (batch size: {}, {} batches)",
            request.num_sims,
            request.game_id,
            request.mode,
            plan.thread_count(),
            plan.batch_size,
            plan.batch_count()
        );
    }

    fn thread_started(&self, partition: &Partition) {
        log::debug!(
            "Thread {}: Starting simulations {}-{}",
            partition.thread_id,
            partition.start_index,
            partition.end_index().saturating_sub(1)
        );
    }

    fn batch_completed(&self, key: &BatchKey, batches_in_partition: usize) {
        if key.batch_index % self.progress_every == 0 {
            log::info!(
                "Thread {}: Batch {}/{} (sims {}-{})",
                key.thread_id,
                key.batch_index + 1,
                batches_in_partition,
                key.start_index,
                key.trials().end.saturating_sub(1)
            );
        }
    }

    fn batch_skipped(&self, key: &BatchKey) {
        log::debug!(
            "Thread {}: Batch {} already written, skipping",
            key.thread_id,
            key.batch_index
        );
    }

    fn thread_finished(&self, outcome: &ThreadOutcome) {
        if let Some(err) = &outcome.error {
            log::error!("Thread {} failed: {}", outcome.thread_id, err);
        } else if outcome.cancelled {
            log::warn!(
                "Thread {} stopped after {} batches (run cancelled)",
                outcome.thread_id,
                outcome.batches_completed + outcome.batches_skipped
            );
        } else {
            log::debug!(
                "Thread {}: done ({} batches written, {} skipped)",
                outcome.thread_id,
                outcome.batches_completed,
                outcome.batches_skipped
            );
        }
    }

    fn run_finished(&self, report: &RunReport) {
        if report.succeeded {
            log::info!(
                "All threads completed successfully in {:.2}s",
                report.elapsed.as_secs_f64()
            );
        } else {
            log::error!(
                "Run finished with {} failed and {} cancelled threads in {:.2}s",
                report.failures.len(),
                report.cancelled.len(),
                report.elapsed.as_secs_f64()
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROGRESS OBSERVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Lock-free progress counters, readable while the run is in flight
#[derive(Debug, Default)]
pub struct ProgressObserver {
    total_trials: AtomicU64,
    total_batches: AtomicUsize,
    trials_done: AtomicU64,
    batches_done: AtomicUsize,
    batches_skipped: AtomicUsize,
    threads_finished: AtomicUsize,
    threads_failed: AtomicUsize,
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trials simulated and written so far
    pub fn trials_done(&self) -> u64 {
        self.trials_done.load(Ordering::Relaxed)
    }

    /// Batches written so far
    pub fn batches_done(&self) -> usize {
        self.batches_done.load(Ordering::Relaxed)
    }

    /// Batches skipped because they were already persisted
    pub fn batches_skipped(&self) -> usize {
        self.batches_skipped.load(Ordering::Relaxed)
    }

    pub fn threads_finished(&self) -> usize {
        self.threads_finished.load(Ordering::Relaxed)
    }

    pub fn threads_failed(&self) -> usize {
        self.threads_failed.load(Ordering::Relaxed)
    }

    /// Progress (0.0 - 1.0) by batches accounted for
    pub fn fraction(&self) -> f64 {
        let total = self.total_batches.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let done = self.batches_done() + self.batches_skipped();
        (done as f64 / total as f64).min(1.0)
    }

    /// Total trials of the current run
    pub fn total_trials(&self) -> u64 {
        self.total_trials.load(Ordering::Relaxed)
    }
}

impl RunObserver for ProgressObserver {
    fn run_started(&self, request: &SimulationRequest, plan: &RunPlan) {
        self.total_trials.store(request.num_sims, Ordering::Relaxed);
        self.total_batches.store(plan.batch_count(), Ordering::Relaxed);
        self.trials_done.store(0, Ordering::Relaxed);
        self.batches_done.store(0, Ordering::Relaxed);
        self.batches_skipped.store(0, Ordering::Relaxed);
        self.threads_finished.store(0, Ordering::Relaxed);
        self.threads_failed.store(0, Ordering::Relaxed);
    }

    fn batch_completed(&self, key: &BatchKey, _batches_in_partition: usize) {
        self.trials_done.fetch_add(key.size, Ordering::Relaxed);
        self.batches_done.fetch_add(1, Ordering::Relaxed);
    }

    fn batch_skipped(&self, _key: &BatchKey) {
        self.batches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn thread_finished(&self, outcome: &ThreadOutcome) {
        self.threads_finished.fetch_add(1, Ordering::Relaxed);
        if outcome.error.is_some() {
            self.threads_failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OBSERVER SET
// ═══════════════════════════════════════════════════════════════════════════════

/// Fans every event out to several observers, in insertion order
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    pub fn with(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl RunObserver for ObserverSet {
    fn run_started(&self, request: &SimulationRequest, plan: &RunPlan) {
        for o in &self.observers {
            o.run_started(request, plan);
        }
    }

    fn thread_started(&self, partition: &Partition) {
        for o in &self.observers {
            o.thread_started(partition);
        }
    }

    fn batch_completed(&self, key: &BatchKey, batches_in_partition: usize) {
        for o in &self.observers {
            o.batch_completed(key, batches_in_partition);
        }
    }

    fn batch_skipped(&self, key: &BatchKey) {
        for o in &self.observers {
            o.batch_skipped(key);
        }
    }

    fn thread_finished(&self, outcome: &ThreadOutcome) {
        for o in &self.observers {
            o.thread_finished(outcome);
        }
    }

    fn run_finished(&self, report: &RunReport) {
        for o in &self.observers {
            o.run_finished(report);
        }
    }
}
