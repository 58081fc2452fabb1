//! # sb-engine: SpinBook simulation engine
//!
//! Splits a [`SimulationRequest`](sb_core::SimulationRequest) into per-worker
//! partitions, runs every partition's batches through a pluggable kernel on a
//! fixed pool of worker threads, persists each completed batch, and joins all
//! workers into a single [`RunReport`].
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                            │
//! │   plan() ──> RunPlan                                           │
//! │                                                                │
//! │  ┌──────────────── worker pool (thread_count) ──────────────┐ │
//! │  │ WorkerTask 0: [Batch 0] → [Batch 1] → ...                │ │
//! │  │ WorkerTask 1: [Batch 0] → [Batch 1] → ...                │ │
//! │  │ ...                                                      │ │
//! │  └──────────────────────────────────────────────────────────┘ │
//! │        │ BatchExecutor: kernel.simulate(trial) × size          │
//! │        └──> OutputWriter::write(BatchKey, books)               │
//! │                                                                │
//! │   join all ──> ThreadOutcome × N ──> RunReport                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sb_core::{Book, FnKernel, SimulationRequest};
//! use sb_engine::Orchestrator;
//!
//! let request = SimulationRequest::new("0_0_lines", "base")
//!     .with_sims(100_000)
//!     .with_threads(10)
//!     .with_batch_size(5_000);
//!
//! let factory = |_thread| FnKernel::new(|trial| Ok(Book::from_value(trial, game_math(trial))));
//! let report = Orchestrator::new().run(&request, &factory, &writer)?;
//! assert!(report.succeeded);
//! ```

mod batch;
mod cancel;
mod error;
mod observer;
mod orchestrator;
mod report;
mod worker;

pub use batch::*;
pub use cancel::*;
pub use error::*;
pub use observer::*;
pub use orchestrator::*;
pub use report::*;
pub use worker::*;
