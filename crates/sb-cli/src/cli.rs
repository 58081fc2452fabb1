//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

use sb_core::{DEFAULT_BATCH_SIZE, DEFAULT_NUM_SIMS, DEFAULT_THREAD_COUNT, SimulationRequest};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "spinbook",
    version,
    about = "Partitioned slot simulation runner",
    args_override_self = true
)]
pub struct Cli {
    /// Game ID (e.g. 0_0_lines)
    #[arg(long)]
    pub game: String,

    /// Bet mode (e.g. base)
    #[arg(long)]
    pub mode: String,

    /// Number of simulations
    #[arg(long, default_value_t = DEFAULT_NUM_SIMS)]
    pub sims: u64,

    /// Number of worker threads
    #[arg(long, default_value_t = DEFAULT_THREAD_COUNT)]
    pub threads: usize,

    /// Simulations per batch file
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch: u64,

    /// Compress books with zstd (default)
    #[arg(long, overrides_with = "no_compress")]
    pub compress: bool,

    /// Write plain JSONL books
    #[arg(long, overrides_with = "compress")]
    pub no_compress: bool,

    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop all threads once one fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Skip batches already written by an earlier run
    #[arg(long)]
    pub resume: bool,

    /// Do not merge batch files after the run
    #[arg(long)]
    pub no_publish: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Cli {
    pub fn compress(&self) -> bool {
        !self.no_compress
    }

    /// Request described by the arguments
    pub fn request(&self) -> SimulationRequest {
        SimulationRequest::new(self.game.as_str(), self.mode.as_str())
            .with_sims(self.sims)
            .with_threads(self.threads)
            .with_batch_size(self.batch)
            .with_compress(self.compress())
    }
}
