//! In-memory output writer

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use sb_core::{BatchKey, Book, OutputWriter, WriteError};

/// Keeps every written batch in memory
///
/// Rejects a second write to the same key, and can be told to fail writes
/// for chosen `(thread_id, batch_index)` pairs.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    batches: Mutex<BTreeMap<BatchKey, Vec<Book>>>,
    failing: Mutex<HashSet<(usize, usize)>>,
    write_calls: AtomicUsize,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write to this batch
    pub fn fail_batch(self, thread_id: usize, batch_index: usize) -> Self {
        self.failing.lock().insert((thread_id, batch_index));
        self
    }

    /// Stop failing writes to this batch
    pub fn heal_batch(&self, thread_id: usize, batch_index: usize) {
        self.failing.lock().remove(&(thread_id, batch_index));
    }

    /// Number of stored batches
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }

    /// Number of `write` calls, including failed ones
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::Relaxed)
    }

    /// Stored keys in key order
    pub fn keys(&self) -> Vec<BatchKey> {
        self.batches.lock().keys().cloned().collect()
    }

    /// Books of one batch
    pub fn books(&self, key: &BatchKey) -> Option<Vec<Book>> {
        self.batches.lock().get(key).cloned()
    }

    /// Every stored book, ordered by trial index
    pub fn all_books(&self) -> Vec<Book> {
        let mut all: Vec<Book> = self.batches.lock().values().flatten().cloned().collect();
        all.sort_by_key(Book::trial_index);
        all
    }

    /// Total stored books
    pub fn total_books(&self) -> usize {
        self.batches.lock().values().map(Vec::len).sum()
    }

    /// Drop a stored batch
    pub fn remove(&self, key: &BatchKey) -> Option<Vec<Book>> {
        self.batches.lock().remove(key)
    }
}

impl OutputWriter for MemoryWriter {
    fn write(&self, key: &BatchKey, books: Vec<Book>, _compress: bool) -> Result<(), WriteError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);

        if self.failing.lock().contains(&(key.thread_id, key.batch_index)) {
            return Err(WriteError::Rejected(format!("injected failure for {key}")));
        }

        let mut batches = self.batches.lock();
        if batches.contains_key(key) {
            return Err(WriteError::Duplicate(key.to_string()));
        }
        batches.insert(key.clone(), books);
        Ok(())
    }

    fn contains(&self, key: &BatchKey, _compress: bool) -> bool {
        self.batches.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::{SimulationRequest, plan};
    use serde_json::json;

    fn keys() -> Vec<BatchKey> {
        let request = SimulationRequest::new("g", "base")
            .with_sims(8)
            .with_threads(2)
            .with_batch_size(2);
        let plan = plan(&request).unwrap();
        plan.iter_batches()
            .map(|(p, b)| BatchKey::new(&request, p, &b))
            .collect()
    }

    fn books(key: &BatchKey) -> Vec<Book> {
        key.trials().map(|t| Book::from_value(t, json!({}))).collect()
    }

    #[test]
    fn test_duplicate_write_rejected() {
        let writer = MemoryWriter::new();
        let key = &keys()[0];
        writer.write(key, books(key), false).unwrap();
        assert!(matches!(
            writer.write(key, books(key), false),
            Err(WriteError::Duplicate(_))
        ));
        assert_eq!(writer.len(), 1);
        assert_eq!(writer.write_calls(), 2);
    }

    #[test]
    fn test_injected_failure() {
        let writer = MemoryWriter::new().fail_batch(1, 0);
        let keys = keys();
        assert!(writer.write(&keys[2], books(&keys[2]), false).is_err());
        assert!(!writer.contains(&keys[2], false));

        writer.heal_batch(1, 0);
        writer.write(&keys[2], books(&keys[2]), false).unwrap();
        assert!(writer.contains(&keys[2], false));
    }

    #[test]
    fn test_all_books_sorted() {
        let writer = MemoryWriter::new();
        for key in keys().iter().rev() {
            writer.write(key, books(key), false).unwrap();
        }
        let ids: Vec<u64> = writer.all_books().iter().map(Book::trial_index).collect();
        assert_eq!(ids, (0..8).collect::<Vec<u64>>());
        assert_eq!(writer.total_books(), 8);
    }
}
