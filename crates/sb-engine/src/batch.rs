//! Batch execution: simulate every trial of one batch, then persist it

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use sb_core::{BatchKey, Book, KernelError, OutputWriter, SimulationKernel, WriteError};

use crate::error::BatchError;

/// Runs one batch through a kernel and hands the books to the writer
///
/// A batch is atomic: either every trial is simulated and the batch is
/// written exactly once, or nothing is written at all.
pub struct BatchExecutor<'a, W: OutputWriter + ?Sized> {
    writer: &'a W,
    compress: bool,
}

impl<'a, W: OutputWriter + ?Sized> BatchExecutor<'a, W> {
    /// Create an executor writing through `writer`
    pub fn new(writer: &'a W, compress: bool) -> Self {
        Self { writer, compress }
    }

    /// Execute the batch addressed by `key`
    ///
    /// Trials run in ascending order. The first kernel failure aborts the
    /// batch; later trials are not simulated. Returns the number of books
    /// written.
    pub fn execute<K>(&self, key: &BatchKey, kernel: &mut K) -> Result<usize, BatchError>
    where
        K: SimulationKernel + ?Sized,
    {
        let mut books = Vec::with_capacity(key.size as usize);

        for trial_index in key.trials() {
            let book = simulate_trial(kernel, trial_index).map_err(|source| BatchError::Kernel {
                thread_id: key.thread_id,
                batch_index: key.batch_index,
                trial_index,
                source,
            })?;
            books.push(book);
        }

        let written = books.len();
        write_batch(self.writer, key, books, self.compress).map_err(|source| {
            BatchError::Write {
                thread_id: key.thread_id,
                batch_index: key.batch_index,
                source,
            }
        })?;

        Ok(written)
    }
}

/// One kernel call; a panic becomes a kernel error for that trial
fn simulate_trial<K>(kernel: &mut K, trial_index: u64) -> Result<Book, KernelError>
where
    K: SimulationKernel + ?Sized,
{
    let book = match panic::catch_unwind(AssertUnwindSafe(|| kernel.simulate(trial_index))) {
        Ok(result) => result?,
        Err(payload) => return Err(KernelError::Panicked(panic_message(payload.as_ref()))),
    };

    if book.trial_index() != trial_index {
        return Err(KernelError::Failed(format!(
            "kernel returned book for trial {} while simulating trial {}",
            book.trial_index(),
            trial_index
        )));
    }

    Ok(book)
}

fn write_batch<W>(
    writer: &W,
    key: &BatchKey,
    books: Vec<Book>,
    compress: bool,
) -> Result<(), WriteError>
where
    W: OutputWriter + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| writer.write(key, books, compress))) {
        Ok(result) => result,
        Err(payload) => Err(WriteError::Rejected(format!(
            "writer panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use sb_core::{FnKernel, SimulationRequest, plan};
    use serde_json::json;

    #[derive(Default)]
    struct RecordingWriter {
        writes: Mutex<Vec<(BatchKey, Vec<u64>)>>,
        fail: bool,
    }

    impl OutputWriter for RecordingWriter {
        fn write(
            &self,
            key: &BatchKey,
            books: Vec<Book>,
            _compress: bool,
        ) -> Result<(), WriteError> {
            if self.fail {
                return Err(WriteError::Rejected("disk full".into()));
            }
            let ids = books.iter().map(Book::trial_index).collect();
            self.writes.lock().push((key.clone(), ids));
            Ok(())
        }
    }

    fn key() -> BatchKey {
        let request = SimulationRequest::new("g", "base")
            .with_sims(40)
            .with_threads(2)
            .with_batch_size(5);
        let plan = plan(&request).unwrap();
        let partition = &plan.partitions[1];
        BatchKey::new(&request, partition, &partition.batch(2).unwrap())
    }

    #[test]
    fn test_batch_written_in_trial_order() {
        let writer = RecordingWriter::default();
        let executor = BatchExecutor::new(&writer, false);
        let mut kernel = FnKernel::new(|trial| Ok(Book::from_value(trial, json!({ "win": 0 }))));

        let written = executor.execute(&key(), &mut kernel).unwrap();
        assert_eq!(written, 5);

        let writes = writer.writes.lock();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, vec![30, 31, 32, 33, 34]);
    }

    #[test]
    fn test_kernel_failure_aborts_batch() {
        let writer = RecordingWriter::default();
        let executor = BatchExecutor::new(&writer, false);
        let mut seen = Vec::new();
        let mut kernel = FnKernel::new(|trial| {
            seen.push(trial);
            if trial == 32 {
                Err(KernelError::Failed("bad reel".into()))
            } else {
                Ok(Book::from_value(trial, json!({})))
            }
        });

        let err = executor.execute(&key(), &mut kernel).unwrap_err();
        drop(kernel);

        assert_eq!(err.thread_id(), 1);
        assert_eq!(err.batch_index(), Some(2));
        assert_eq!(err.trial_index(), Some(32));
        assert_eq!(seen, vec![30, 31, 32]);
        assert!(writer.writes.lock().is_empty());
    }

    #[test]
    fn test_kernel_panic_is_captured() {
        let writer = RecordingWriter::default();
        let executor = BatchExecutor::new(&writer, false);
        let mut kernel = FnKernel::new(|trial| {
            if trial == 31 {
                panic!("paytable lookup failed");
            }
            Ok(Book::from_value(trial, json!({})))
        });

        let err = executor.execute(&key(), &mut kernel).unwrap_err();
        match err {
            BatchError::Kernel { trial_index, source: KernelError::Panicked(msg), .. } => {
                assert_eq!(trial_index, 31);
                assert!(msg.contains("paytable lookup failed"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(writer.writes.lock().is_empty());
    }

    #[test]
    fn test_mismatched_book_rejected() {
        let writer = RecordingWriter::default();
        let executor = BatchExecutor::new(&writer, false);
        let mut kernel = FnKernel::new(|_trial| Ok(Book::from_value(0, json!({}))));

        let err = executor.execute(&key(), &mut kernel).unwrap_err();
        assert_eq!(err.trial_index(), Some(30));
        assert!(writer.writes.lock().is_empty());
    }

    #[test]
    fn test_write_failure_tagged() {
        let writer = RecordingWriter {
            fail: true,
            ..Default::default()
        };
        let executor = BatchExecutor::new(&writer, true);
        let mut kernel = FnKernel::new(|trial| Ok(Book::from_value(trial, json!({}))));

        let err = executor.execute(&key(), &mut kernel).unwrap_err();
        assert!(matches!(
            err,
            BatchError::Write { thread_id: 1, batch_index: 2, .. }
        ));
        assert_eq!(err.trial_index(), None);
    }
}
