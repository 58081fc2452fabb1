//! End-to-End Engine Integration Tests
//!
//! Runs complete requests through the orchestrator into an in-memory writer:
//! - Partitioning and persistence
//! - Failure isolation between workers
//! - Fail-fast cancellation and resume

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sb_core::{Book, FnKernel, KernelError, SimulationRequest, plan};
use sb_engine::{BatchError, NullObserver, Orchestrator, ProgressObserver, RunState};
use sb_output::MemoryWriter;
use serde_json::json;

const NUM_SIMS: u64 = 1000;
const THREADS: usize = 4;
const BATCH: u64 = 50;

fn request() -> SimulationRequest {
    SimulationRequest::new("0_0_lines", "base")
        .with_sims(NUM_SIMS)
        .with_threads(THREADS)
        .with_batch_size(BATCH)
}

fn quiet() -> Orchestrator {
    Orchestrator::new().with_observer(Arc::new(NullObserver))
}

/// Book depends on the trial index only
fn book(trial: u64) -> Book {
    let payout = (trial * 7919) % 1000;
    Book::from_value(
        trial,
        json!({
            "payoutMultiplier": payout,
            "criteria": if payout == 0 { "0" } else { "basegame" },
        }),
    )
}

fn ids(books: &[Book]) -> Vec<u64> {
    books.iter().map(Book::id).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUCCESSFUL RUNS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_full_run_persists_every_trial_once() {
    let writer = MemoryWriter::new();
    let factory = |_: usize| FnKernel::new(|trial| Ok(book(trial)));

    let orchestrator = quiet();
    let report = orchestrator.run(&request(), &factory, &writer).unwrap();

    assert!(report.succeeded);
    assert_eq!(orchestrator.state(), RunState::Succeeded);
    assert_eq!(report.thread_count(), THREADS);
    assert_eq!(report.trials_simulated(), NUM_SIMS);
    assert_eq!(report.batches_completed(), 20);

    assert_eq!(writer.len(), 20);
    assert_eq!(writer.write_calls(), 20);
    assert_eq!(ids(&writer.all_books()), (1..=NUM_SIMS).collect::<Vec<u64>>());
}

#[test]
fn test_batch_keys_unique_and_match_plan() {
    let writer = MemoryWriter::new();
    let factory = |_: usize| FnKernel::new(|trial| Ok(book(trial)));
    quiet().run(&request(), &factory, &writer).unwrap();

    let plan = plan(&request()).unwrap();
    let keys = writer.keys();
    let addresses: HashSet<(usize, usize)> =
        keys.iter().map(|k| (k.thread_id, k.batch_index)).collect();
    assert_eq!(addresses.len(), plan.batch_count());

    for key in &keys {
        let batch = plan.batch(key.thread_id, key.batch_index).unwrap();
        assert_eq!(key.start_index, batch.start_index);
        let books = writer.books(key).unwrap();
        assert_eq!(books.len() as u64, BATCH);
        assert_eq!(books[0].trial_index(), batch.start_index);
    }
}

#[test]
fn test_books_independent_of_thread_count() {
    let factory = |_: usize| FnKernel::new(|trial| Ok(book(trial)));

    let two = MemoryWriter::new();
    quiet().run(&request().with_threads(2), &factory, &two).unwrap();

    let five = MemoryWriter::new();
    quiet().run(&request().with_threads(5), &factory, &five).unwrap();

    assert_eq!(two.all_books(), five.all_books());
    assert_ne!(two.keys(), five.keys());
}

#[test]
fn test_progress_observer_sees_whole_run() {
    let progress = Arc::new(ProgressObserver::new());
    let orchestrator = Orchestrator::new().with_observer(progress.clone());
    let factory = |_: usize| FnKernel::new(|trial| Ok(book(trial)));

    orchestrator.run(&request(), &factory, &MemoryWriter::new()).unwrap();

    assert_eq!(progress.total_trials(), NUM_SIMS);
    assert_eq!(progress.trials_done(), NUM_SIMS);
    assert_eq!(progress.batches_done(), 20);
    assert_eq!(progress.threads_finished(), THREADS);
    assert_eq!(progress.threads_failed(), 0);
    assert!((progress.fraction() - 1.0).abs() < 1e-9);
}

// ═══════════════════════════════════════════════════════════════════════════════
// FAILURE ISOLATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_kernel_failure_stops_only_its_worker() {
    let writer = MemoryWriter::new();
    let factory = |_: usize| {
        FnKernel::new(|trial| {
            if trial == 137 {
                Err(KernelError::Failed("no winning line".into()))
            } else {
                Ok(book(trial))
            }
        })
    };

    let orchestrator = quiet();
    let report = orchestrator.run(&request(), &factory, &writer).unwrap();

    assert!(!report.succeeded);
    assert_eq!(orchestrator.state(), RunState::PartialFailure);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.completed.len(), THREADS - 1);

    let failure = &report.failures[0];
    assert_eq!(failure.thread_id, 0);
    assert_eq!(failure.batches_completed, 2);
    assert!(matches!(
        failure.error,
        Some(BatchError::Kernel {
            thread_id: 0,
            batch_index: 2,
            trial_index: 137,
            ..
        })
    ));

    // Batches 0 and 1 of thread 0 plus every batch of the others
    assert_eq!(writer.len(), 2 + 15);
    assert!(writer.all_books().iter().all(|b| !(100..250).contains(&b.trial_index())));

    let plan = plan(&request()).unwrap();
    let unfinished = report.unfinished_batches(&plan);
    let starts: Vec<u64> = unfinished.iter().map(|(_, b)| b.start_index).collect();
    assert_eq!(starts, vec![100, 150, 200]);
}

#[test]
fn test_kernel_panic_is_contained() {
    let writer = MemoryWriter::new();
    let factory = |_: usize| {
        FnKernel::new(|trial| {
            if trial == 600 {
                panic!("reel strip exhausted");
            }
            Ok(book(trial))
        })
    };

    let report = quiet().run(&request(), &factory, &writer).unwrap();

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.thread_id, 2);
    match &failure.error {
        Some(BatchError::Kernel { trial_index, source, .. }) => {
            assert_eq!(*trial_index, 600);
            assert!(matches!(source, KernelError::Panicked(msg) if msg.contains("reel strip")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(writer.len(), 2 + 15);
}

#[test]
fn test_write_failure_stops_only_its_worker() {
    let writer = MemoryWriter::new().fail_batch(3, 1);
    let factory = |_: usize| FnKernel::new(|trial| Ok(book(trial)));

    let report = quiet().run(&request(), &factory, &writer).unwrap();

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.thread_id, 3);
    assert!(matches!(
        failure.error,
        Some(BatchError::Write {
            thread_id: 3,
            batch_index: 1,
            ..
        })
    ));
    assert_eq!(writer.len(), 1 + 15);
    assert_eq!(report.failed_batches()[0].trial_index, None);
}

// ═══════════════════════════════════════════════════════════════════════════════
// FAIL-FAST AND RESUME
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_fail_fast_cancels_other_workers() {
    let failed = Arc::new(AtomicBool::new(false));
    let factory = |thread_id: usize| {
        let failed = failed.clone();
        FnKernel::new(move |trial| {
            if thread_id == 0 {
                failed.store(true, Ordering::SeqCst);
                return Err(KernelError::Failed("bad config".into()));
            }
            // Hold the first batch open until the failure is in
            if trial % 250 == 0 {
                let deadline = Instant::now() + Duration::from_secs(10);
                while !failed.load(Ordering::SeqCst) && Instant::now() < deadline {
                    std::thread::yield_now();
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Ok(book(trial))
        })
    };

    let writer = MemoryWriter::new();
    let report = quiet()
        .with_fail_fast(true)
        .run(&request(), &factory, &writer)
        .unwrap();

    assert!(!report.succeeded);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.cancelled.len(), THREADS - 1);
    // A started batch always finishes
    assert!(report.cancelled.iter().all(|o| o.batches_completed == 1));
    assert_eq!(writer.len(), THREADS - 1);

    let plan = plan(&request()).unwrap();
    assert_eq!(report.unfinished_batches(&plan).len(), 5 + 3 * 4);
}

#[test]
fn test_without_fail_fast_others_finish() {
    let factory = |thread_id: usize| {
        FnKernel::new(move |trial| {
            if thread_id == 0 {
                return Err(KernelError::Failed("bad config".into()));
            }
            Ok(book(trial))
        })
    };

    let writer = MemoryWriter::new();
    let report = quiet().run(&request(), &factory, &writer).unwrap();

    assert!(report.cancelled.is_empty());
    assert_eq!(report.completed.len(), THREADS - 1);
    assert_eq!(writer.len(), 15);
}

#[test]
fn test_resume_reruns_only_missing_batches() {
    let factory = |_: usize| FnKernel::new(|trial| Ok(book(trial)));
    let writer = MemoryWriter::new().fail_batch(1, 3);

    let first = quiet().run(&request(), &factory, &writer).unwrap();
    assert!(!first.succeeded);
    assert_eq!(writer.len(), 18);

    writer.heal_batch(1, 3);
    let orchestrator = quiet().with_resume(true);
    let second = orchestrator.run(&request(), &factory, &writer).unwrap();

    assert!(second.succeeded);
    assert_eq!(second.batches_skipped(), 18);
    assert_eq!(second.batches_completed(), 2);
    assert_eq!(second.trials_simulated(), 2 * BATCH);

    let fresh = MemoryWriter::new();
    quiet().run(&request(), &factory, &fresh).unwrap();
    assert_eq!(writer.all_books(), fresh.all_books());
}

#[test]
fn test_rejected_request_writes_nothing() {
    let writer = MemoryWriter::new();
    let factory = |_: usize| FnKernel::new(|trial| Ok(book(trial)));

    let orchestrator = quiet();
    assert!(orchestrator.run(&request().with_threads(3), &factory, &writer).is_err());
    assert!(orchestrator.run(&request().with_batch_size(60), &factory, &writer).is_err());
    assert_eq!(orchestrator.state(), RunState::Rejected);
    assert_eq!(writer.write_calls(), 0);
}
