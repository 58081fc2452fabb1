//! # sb-core: SpinBook data model and contracts
//!
//! Everything the engine and its collaborators agree on:
//!
//! - [`SimulationRequest`]: what to run (game, mode, trial count, pool size, batch size)
//! - [`RunPlan`]: the deterministic split of `[0, num_sims)` into one
//!   [`Partition`] per worker and fixed-size [`Batch`]es inside each partition
//! - [`Book`]: the outcome record of one trial
//! - [`SimulationKernel`] / [`KernelFactory`]: the pluggable per-trial simulator
//! - [`OutputWriter`] / [`BatchKey`]: the batch persistence contract
//!
//! ## Architecture
//!
//! ```text
//! SimulationRequest ──plan()──> RunPlan
//!                                 │
//!                                 ├── Partition 0: [Batch 0][Batch 1]...
//!                                 ├── Partition 1: [Batch 0][Batch 1]...
//!                                 └── ...
//!
//! KernelFactory ──create(thread)──> SimulationKernel ──simulate(trial)──> Book
//! OutputWriter  <──write(BatchKey, Vec<Book>, compress)──
//! ```

mod book;
mod error;
mod kernel;
mod output;
mod plan;
mod request;

pub use book::*;
pub use error::*;
pub use kernel::*;
pub use output::*;
pub use plan::*;
pub use request::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
