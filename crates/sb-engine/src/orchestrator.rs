//! Run orchestration
//!
//! 1. Plan the request (rejected requests never start a worker)
//! 2. Launch one worker per partition on a pool of exactly `thread_count` threads
//! 3. Join every worker, even after failures
//! 4. Aggregate outcomes into a [`RunReport`]

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use sb_core::{
    KernelError, KernelFactory, OutputWriter, Partition, RunPlan, SimulationRequest, plan,
};

use crate::batch::panic_message;
use crate::cancel::CancelToken;
use crate::error::{BatchError, EngineError, EngineResult};
use crate::observer::{LogObserver, RunObserver};
use crate::report::{RunReport, RunState};
use crate::worker::{ThreadOutcome, WorkerTask};

/// Drives a run from request to report
pub struct Orchestrator {
    observer: Arc<dyn RunObserver>,
    fail_fast: bool,
    resume: bool,
    state: Arc<RwLock<RunState>>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// Create an orchestrator logging through [`LogObserver`]
    pub fn new() -> Self {
        Self {
            observer: Arc::new(LogObserver::default()),
            fail_fast: false,
            resume: false,
            state: Arc::new(RwLock::new(RunState::Idle)),
        }
    }

    /// Set the observer
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Stop all workers before their next batch once any worker fails
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Skip batches the writer already holds
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Get current state
    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    fn set_state(&self, state: RunState) {
        *self.state.write() = state;
    }

    /// Run every trial of the request
    ///
    /// Returns `Err` only when nothing ran (invalid request, pool failure).
    /// Worker failures, panics included, are reported in the [`RunReport`].
    pub fn run<F, W>(
        &self,
        request: &SimulationRequest,
        factory: &F,
        writer: &W,
    ) -> EngineResult<RunReport>
    where
        F: KernelFactory,
        W: OutputWriter + ?Sized,
    {
        self.set_state(RunState::Planning);
        let plan = match plan(request) {
            Ok(plan) => plan,
            Err(err) => {
                self.set_state(RunState::Rejected);
                return Err(err.into());
            }
        };

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(plan.thread_count())
            .thread_name(|i| format!("sb-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                self.set_state(RunState::Rejected);
                return Err(EngineError::ThreadPool(err.to_string()));
            }
        };

        self.notify("run_started", || self.observer.run_started(request, &plan));
        let cancel = CancelToken::new();

        self.set_state(RunState::Running);
        let start = Instant::now();
        let outcomes = self.dispatch(&pool, request, &plan, factory, writer, &cancel);

        self.set_state(RunState::Aggregating);
        let report = RunReport::from_outcomes(outcomes, start.elapsed());

        self.set_state(report.state());
        self.notify("run_finished", || self.observer.run_finished(&report));
        Ok(report)
    }

    /// Observer panics outside a worker are logged and dropped
    fn notify(&self, event: &str, f: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            log::error!("Observer panicked in {}: {}", event, panic_message(payload.as_ref()));
        }
    }

    /// One pool task per partition; outcomes come back over a channel
    fn dispatch<F, W>(
        &self,
        pool: &rayon::ThreadPool,
        request: &SimulationRequest,
        plan: &RunPlan,
        factory: &F,
        writer: &W,
        cancel: &CancelToken,
    ) -> Vec<ThreadOutcome>
    where
        F: KernelFactory,
        W: OutputWriter + ?Sized,
    {
        let (tx, rx) = crossbeam_channel::bounded(plan.thread_count());

        pool.scope(|scope| {
            for partition in &plan.partitions {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.run_partition(request, partition, factory, writer, cancel)
                    }))
                    .unwrap_or_else(|payload| {
                        self.worker_panicked(partition, payload.as_ref(), cancel)
                    });
                    // Receiver outlives the scope
                    let _ = tx.send(outcome);
                });
            }
        });
        drop(tx);

        let mut outcomes: Vec<ThreadOutcome> = rx.into_iter().collect();
        outcomes.sort_by_key(|o| o.thread_id);
        outcomes
    }

    fn run_partition<F, W>(
        &self,
        request: &SimulationRequest,
        partition: &Partition,
        factory: &F,
        writer: &W,
        cancel: &CancelToken,
    ) -> ThreadOutcome
    where
        F: KernelFactory,
        W: OutputWriter + ?Sized,
    {
        let mut worker = WorkerTask::new(request, partition, writer)
            .with_observer(self.observer.as_ref())
            .with_resume(self.resume);
        if self.fail_fast {
            worker = worker.with_cancel(cancel);
        }

        let kernel = panic::catch_unwind(AssertUnwindSafe(|| factory.create(partition.thread_id)))
            .unwrap_or_else(|payload| Err(KernelError::Panicked(panic_message(payload.as_ref()))));
        match kernel {
            Ok(mut kernel) => worker.run(&mut kernel),
            Err(source) => worker.setup_failed(source),
        }
    }

    /// Outcome for a worker that panicked outside a trial or write
    ///
    /// Progress counted before the panic is lost; the whole partition is
    /// treated as unfinished.
    fn worker_panicked(
        &self,
        partition: &Partition,
        payload: &(dyn Any + Send),
        cancel: &CancelToken,
    ) -> ThreadOutcome {
        let message = panic_message(payload);
        log::error!("Thread {} panicked: {}", partition.thread_id, message);
        if self.fail_fast {
            cancel.cancel();
        }
        let mut outcome = ThreadOutcome::new(partition.thread_id);
        outcome.error = Some(BatchError::WorkerPanicked {
            thread_id: partition.thread_id,
            message,
        });
        outcome
    }
}
