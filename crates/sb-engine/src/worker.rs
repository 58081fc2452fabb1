//! Worker task: one partition, batches in ascending order

use sb_core::{BatchKey, KernelError, OutputWriter, Partition, SimulationKernel, SimulationRequest};

use crate::batch::BatchExecutor;
use crate::cancel::CancelToken;
use crate::error::BatchError;
use crate::observer::{NullObserver, RunObserver};

static NULL_OBSERVER: NullObserver = NullObserver;

/// Result of one worker
#[derive(Debug)]
pub struct ThreadOutcome {
    pub thread_id: usize,
    /// Batches simulated and written by this run
    pub batches_completed: usize,
    /// Batches skipped because they were already persisted
    pub batches_skipped: usize,
    /// Trials simulated and written by this run
    pub trials_simulated: u64,
    /// Stopped early because another worker failed (fail-fast only)
    pub cancelled: bool,
    /// First failure; later batches of the partition were not attempted
    pub error: Option<BatchError>,
}

impl ThreadOutcome {
    pub fn new(thread_id: usize) -> Self {
        Self {
            thread_id,
            batches_completed: 0,
            batches_skipped: 0,
            trials_simulated: 0,
            cancelled: false,
            error: None,
        }
    }

    /// Every batch of the partition is persisted
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }

    /// Batches accounted for, in order from the partition start
    pub fn batches_accounted(&self) -> usize {
        self.batches_completed + self.batches_skipped
    }
}

/// Runs every batch of one partition through one kernel
///
/// Fail-fast within the partition: the first batch error stops the worker.
/// Other workers are unaffected unless a [`CancelToken`] is attached.
pub struct WorkerTask<'a, W: OutputWriter + ?Sized> {
    request: &'a SimulationRequest,
    partition: &'a Partition,
    writer: &'a W,
    observer: &'a dyn RunObserver,
    cancel: Option<&'a CancelToken>,
    resume: bool,
}

impl<'a, W: OutputWriter + ?Sized> WorkerTask<'a, W> {
    pub fn new(request: &'a SimulationRequest, partition: &'a Partition, writer: &'a W) -> Self {
        Self {
            request,
            partition,
            writer,
            observer: &NULL_OBSERVER,
            cancel: None,
            resume: false,
        }
    }

    /// Report progress to an observer
    pub fn with_observer(mut self, observer: &'a dyn RunObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Stop before the next batch once the token is cancelled; a failure of
    /// this worker cancels the token
    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Skip batches the writer already holds
    ///
    /// Kernels that carry RNG state between trials produce different books
    /// for a resumed partition unless they seed from the trial index.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Run all batches of the partition
    pub fn run<K>(&self, kernel: &mut K) -> ThreadOutcome
    where
        K: SimulationKernel + ?Sized,
    {
        let partition = self.partition;
        let mut outcome = ThreadOutcome::new(partition.thread_id);
        self.observer.thread_started(partition);

        let executor = BatchExecutor::new(self.writer, self.request.compress);

        for batch in partition.batches() {
            if self.cancel.is_some_and(CancelToken::is_cancelled) {
                outcome.cancelled = true;
                break;
            }

            let key = BatchKey::new(self.request, partition, &batch);

            if self.resume && self.writer.contains(&key, self.request.compress) {
                outcome.batches_skipped += 1;
                self.observer.batch_skipped(&key);
                continue;
            }

            match executor.execute(&key, kernel) {
                Ok(written) => {
                    outcome.batches_completed += 1;
                    outcome.trials_simulated += written as u64;
                    self.observer.batch_completed(&key, partition.batch_count());
                }
                Err(err) => {
                    outcome.error = Some(err);
                    break;
                }
            }
        }

        self.finish(outcome)
    }

    /// Outcome for a worker whose kernel could not be created
    pub fn setup_failed(&self, source: KernelError) -> ThreadOutcome {
        let mut outcome = ThreadOutcome::new(self.partition.thread_id);
        outcome.error = Some(BatchError::KernelSetup {
            thread_id: self.partition.thread_id,
            source,
        });
        self.finish(outcome)
    }

    fn finish(&self, outcome: ThreadOutcome) -> ThreadOutcome {
        if outcome.error.is_some() {
            if let Some(cancel) = self.cancel {
                cancel.cancel();
            }
        }
        self.observer.thread_finished(&outcome);
        outcome
    }
}
