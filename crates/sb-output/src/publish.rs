//! Publish: merge batch files into one book file per mode

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use sb_core::{BatchKey, RunPlan, SimulationRequest};

use crate::codec::book_extension;
use crate::error::{OutputError, OutputResult};
use crate::file::{FileWriter, temp_path};

/// Result of a publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedBooks {
    /// Merged book file
    pub path: PathBuf,
    /// Batch files merged
    pub batches: usize,
    /// Bytes written
    pub bytes: u64,
}

/// Path of the merged book file for a mode
pub fn published_path(publish_dir: &Path, mode: &str, compress: bool) -> PathBuf {
    publish_dir.join(format!("books_{}.{}", mode, book_extension(compress)))
}

/// Concatenate every batch of the plan, in global trial order, into
/// `publish_dir/books_<mode>.jsonl[.zst]`
///
/// Fails without touching an existing published file if any batch file is
/// missing.
pub fn publish(
    writer: &FileWriter,
    request: &SimulationRequest,
    plan: &RunPlan,
    publish_dir: &Path,
) -> OutputResult<PublishedBooks> {
    let sources = || {
        plan.iter_batches().map(|(partition, batch)| {
            writer.batch_path(&BatchKey::new(request, partition, &batch), request.compress)
        })
    };

    if let Some(missing) = sources().find(|p| !p.exists()) {
        return Err(OutputError::MissingBatch(missing.display().to_string()));
    }

    fs::create_dir_all(publish_dir)?;
    let path = published_path(publish_dir, &request.mode, request.compress);
    let tmp = temp_path(&path);

    match concat_files(sources(), &tmp) {
        Ok((batches, bytes)) => {
            fs::rename(&tmp, &path)?;
            log::info!(
                "Published {} batches to {} ({} bytes)",
                batches,
                path.display(),
                bytes
            );
            Ok(PublishedBooks {
                path,
                batches,
                bytes,
            })
        }
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            Err(err.into())
        }
    }
}

/// Returns the number of files copied and the bytes written
fn concat_files(
    sources: impl Iterator<Item = PathBuf>,
    target: &Path,
) -> io::Result<(usize, u64)> {
    let mut out = BufWriter::new(File::create(target)?);
    let mut files = 0;
    let mut bytes = 0;
    for source in sources {
        let mut input = File::open(&source)?;
        bytes += io::copy(&mut input, &mut out)?;
        files += 1;
    }
    out.flush()?;
    Ok((files, bytes))
}
