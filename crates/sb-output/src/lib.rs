//! # sb-output: Book persistence
//!
//! Batches are stored as JSON Lines, one book per line, optionally wrapped
//! in a zstd frame:
//!
//! ```text
//! <books_dir>/<mode>/books_<mode>_<thread>_<batch>.jsonl[.zst]
//! ```
//!
//! Every batch is written to a temporary sibling and renamed into place, so
//! a failed write never leaves a partial batch behind. After a successful
//! run the batch files are concatenated in global trial order into
//! `<publish_dir>/books_<mode>.jsonl[.zst]` (zstd frames concatenate into a
//! valid multi-frame stream) and described by a JSON manifest.

mod codec;
mod error;
mod file;
mod manifest;
mod memory;
mod publish;

pub use codec::*;
pub use error::*;
pub use file::*;
pub use manifest::*;
pub use memory::*;
pub use publish::*;
