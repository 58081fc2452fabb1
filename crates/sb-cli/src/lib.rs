//! # sb-cli: SpinBook runner
//!
//! Glue between the command line and the engine: resolves game paths,
//! picks the game's kernel from the [`KernelRegistry`], runs the request
//! into per-batch book files, then publishes the merged books and a run
//! manifest.
//!
//! ```text
//! spinbook --game demo --mode base --sims 100000 --threads 10 --batch 5000
//!
//! games/demo/library/books/base/books_base_<thread>_<batch>.jsonl.zst
//! games/demo/library/publish_files/books_base.jsonl.zst
//! games/demo/library/publish_files/manifest_base.json
//! ```

mod app;
mod cli;
mod config;
mod demo;
mod registry;

pub use app::*;
pub use cli::*;
pub use config::*;
pub use demo::*;
pub use registry::*;
