//! File-backed output writer

use std::fs;
use std::path::{Path, PathBuf};

use sb_core::{BatchKey, Book, OutputWriter, WriteError};

use crate::codec::{DEFAULT_COMPRESSION_LEVEL, book_extension, decode_books, encode_books};
use crate::error::{OutputError, OutputResult};

/// Writes each batch to its own file under `root/<mode>/`
///
/// Batch files are disjoint per [`BatchKey`], so concurrent writers never
/// touch the same path. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct FileWriter {
    root: PathBuf,
    level: i32,
}

impl FileWriter {
    /// Create a writer rooted at `root` (created on first write)
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Set the zstd compression level
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every batch of a mode
    pub fn mode_dir(&self, mode: &str) -> PathBuf {
        self.root.join(mode)
    }

    /// Final path of a batch
    pub fn batch_path(&self, key: &BatchKey, compress: bool) -> PathBuf {
        self.mode_dir(&key.mode)
            .join(format!("{}.{}", key.file_stem(), book_extension(compress)))
    }

    /// Read a persisted batch back
    pub fn read_batch(&self, key: &BatchKey, compress: bool) -> OutputResult<Vec<Book>> {
        let path = self.batch_path(key, compress);
        if !path.exists() {
            return Err(OutputError::MissingBatch(path.display().to_string()));
        }
        decode_books(&fs::read(&path)?)
    }

    /// Delete every batch file of a mode
    pub fn clear_mode(&self, mode: &str) -> OutputResult<()> {
        let dir = self.mode_dir(mode);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

impl OutputWriter for FileWriter {
    fn write(&self, key: &BatchKey, books: Vec<Book>, compress: bool) -> Result<(), WriteError> {
        let bytes = encode_books(&books, compress, self.level)?;
        drop(books);

        let path = self.batch_path(key, compress);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(&path);
        if let Err(err) = fs::write(&tmp, &bytes).and_then(|_| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }

        log::trace!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// A batch counts as persisted only when the file for `compress` exists
    /// and holds exactly the key's trial range. Files left by a run with a
    /// different plan share the name but not the range; they are rewritten.
    fn contains(&self, key: &BatchKey, compress: bool) -> bool {
        if !self.batch_path(key, compress).exists() {
            return false;
        }
        match self.read_batch(key, compress) {
            Ok(books) if books.iter().map(Book::trial_index).eq(key.trials()) => true,
            Ok(books) => {
                log::warn!(
                    "Stale batch file for {} ({} books, first id {:?}); rewriting",
                    key,
                    books.len(),
                    books.first().map(Book::id)
                );
                false
            }
            Err(err) => {
                log::warn!("Unreadable batch file for {}: {}; rewriting", key, err);
                false
            }
        }
    }
}

/// Sibling path used while a file is being written
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::{SimulationRequest, plan};
    use serde_json::json;

    fn first_key() -> BatchKey {
        let request = SimulationRequest::new("0_0_lines", "base")
            .with_sims(20)
            .with_threads(2)
            .with_batch_size(5);
        let plan = plan(&request).unwrap();
        BatchKey::new(&request, &plan.partitions[1], &plan.partitions[1].batch(1).unwrap())
    }

    fn books(key: &BatchKey) -> Vec<Book> {
        key.trials()
            .map(|t| Book::from_value(t, json!({ "payoutMultiplier": 0 })))
            .collect()
    }

    #[test]
    fn test_batch_path_layout() {
        let writer = FileWriter::new("/data/books");
        let key = first_key();
        assert_eq!(
            writer.batch_path(&key, true),
            PathBuf::from("/data/books/base/books_base_1_1.jsonl.zst")
        );
        assert_eq!(
            writer.batch_path(&key, false),
            PathBuf::from("/data/books/base/books_base_1_1.jsonl")
        );
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        let key = first_key();

        assert!(!writer.contains(&key, true));
        writer.write(&key, books(&key), true).unwrap();
        assert!(writer.contains(&key, true));
        assert!(!temp_path(&writer.batch_path(&key, true)).exists());

        let read = writer.read_batch(&key, true).unwrap();
        let ids: Vec<u64> = read.iter().map(Book::trial_index).collect();
        assert_eq!(ids, vec![15, 16, 17, 18, 19]);
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the mode directory should be makes create_dir_all fail
        fs::write(dir.path().join("base"), b"occupied").unwrap();
        let writer = FileWriter::new(dir.path());
        let key = first_key();

        let err = writer.write(&key, books(&key), false).unwrap_err();
        assert!(matches!(err, WriteError::Io(_)));
        assert!(!writer.contains(&key, false));
    }

    #[test]
    fn test_missing_batch_read() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        assert!(matches!(
            writer.read_batch(&first_key(), false),
            Err(OutputError::MissingBatch(_))
        ));
    }

    #[test]
    fn test_clear_mode() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        let key = first_key();
        writer.write(&key, books(&key), false).unwrap();
        writer.clear_mode("base").unwrap();
        assert!(!writer.contains(&key, false));
    }

    #[test]
    fn test_contains_rejects_batch_from_another_plan() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        // Same file name, books_base_1_1, but trials 25-29 instead of 15-19
        let request = SimulationRequest::new("0_0_lines", "base")
            .with_sims(40)
            .with_threads(2)
            .with_batch_size(5);
        let plan = plan(&request).unwrap();
        let partition = &plan.partitions[1];
        let old = BatchKey::new(&request, partition, &partition.batch(1).unwrap());
        writer.write(&old, books(&old), true).unwrap();

        let key = first_key();
        assert_eq!(old.file_stem(), key.file_stem());
        assert!(writer.contains(&old, true));
        assert!(!writer.contains(&key, true));
    }

    #[test]
    fn test_contains_requires_matching_compression() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        let key = first_key();
        writer.write(&key, books(&key), false).unwrap();

        assert!(writer.contains(&key, false));
        assert!(!writer.contains(&key, true));
    }

    #[test]
    fn test_contains_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        let key = first_key();
        let path = writer.batch_path(&key, true);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not zstd").unwrap();

        assert!(!writer.contains(&key, true));
        writer.write(&key, books(&key), true).unwrap();
        assert!(writer.contains(&key, true));
    }
}
