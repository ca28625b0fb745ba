//! Buffered single-writer sinks for match and error records.

use crate::constants::RESULT_FLUSH_ATTEMPTS;
use crate::error::{Error, Result};
use crate::model::{ErrorRecord, MatchRecord};
use crate::output::{JsonLinesWriter, RecordWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// What a sink does when its writer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Retry up to `attempts` times, then fail the run. Records stay
    /// buffered so nothing confirmed is silently lost.
    Required {
        /// Write attempts per flush.
        attempts: u32,
    },
    /// Log and keep the records buffered for the next flush.
    BestEffort,
}

struct SinkState<T> {
    buffer: Vec<T>,
    writer: Box<dyn RecordWriter<T>>,
    written: u64,
}

/// Buffers records in memory and appends them to a [`RecordWriter`] in
/// batches.
///
/// The buffer and writer sit behind one mutex, so a sink may be shared, but
/// only one flush runs at a time.
pub struct BufferedSink<T> {
    kind: SinkKind,
    capacity: usize,
    policy: FlushPolicy,
    state: Mutex<SinkState<T>>,
}

#[derive(Debug, Clone, Copy)]
enum SinkKind {
    Matches,
    Errors,
    Other,
}

/// Sink for confirmed matches. Flush failures are fatal.
pub type ResultSink = BufferedSink<MatchRecord>;

/// Sink for failed pairs. Flush failures during a run are logged; see
/// [`BufferedSink::flush_required`] for the final flush.
pub type ErrorSink = BufferedSink<ErrorRecord>;

impl ResultSink {
    /// Match sink appending JSON Lines to `path`.
    pub fn matches(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let mut sink = Self::new(
            Box::new(JsonLinesWriter::<MatchRecord>::new(path)),
            capacity,
            FlushPolicy::Required {
                attempts: RESULT_FLUSH_ATTEMPTS,
            },
        );
        sink.kind = SinkKind::Matches;
        sink
    }
}

impl ErrorSink {
    /// Error sink appending JSON Lines to `path`.
    pub fn errors(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let mut sink = Self::new(
            Box::new(JsonLinesWriter::<ErrorRecord>::new(path)),
            capacity,
            FlushPolicy::BestEffort,
        );
        sink.kind = SinkKind::Errors;
        sink
    }
}

impl<T> BufferedSink<T> {
    /// Sink over an arbitrary writer. `capacity` is clamped to at least 1.
    pub fn new(writer: Box<dyn RecordWriter<T>>, capacity: usize, policy: FlushPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            kind: SinkKind::Other,
            capacity,
            policy,
            state: Mutex::new(SinkState {
                buffer: Vec::with_capacity(capacity),
                writer,
                written: 0,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SinkState<T>>> {
        self.state.lock().map_err(|_| Error::Internal {
            message: "sink mutex poisoned".to_string(),
        })
    }

    /// Buffer one record, flushing when the buffer reaches capacity.
    pub fn push(&self, record: T) -> Result<()> {
        let mut state = self.lock()?;
        state.buffer.push(record);
        if state.buffer.len() >= self.capacity {
            self.flush_locked(&mut state, self.policy)?;
        }
        Ok(())
    }

    /// Write out everything buffered.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.lock()?;
        self.flush_locked(&mut state, self.policy)
    }

    /// Write out everything buffered, retrying up to `attempts` times and
    /// failing if the records still cannot be written, whatever the sink's
    /// own policy.
    pub fn flush_required(&self, attempts: u32) -> Result<()> {
        let mut state = self.lock()?;
        self.flush_locked(&mut state, FlushPolicy::Required { attempts })
    }

    /// Records durably written so far.
    pub fn written(&self) -> u64 {
        self.lock().map_or(0, |s| s.written)
    }

    /// Records waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.lock().map_or(0, |s| s.buffer.len())
    }

    /// Destination path of the underlying writer.
    pub fn path(&self) -> PathBuf {
        self.lock()
            .map_or_else(|_| PathBuf::new(), |s| s.writer.path().to_path_buf())
    }

    fn flush_locked(&self, state: &mut SinkState<T>, policy: FlushPolicy) -> Result<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }
        let count = state.buffer.len();
        let SinkState { buffer, writer, .. } = state;

        match policy {
            FlushPolicy::Required { attempts } => {
                let attempts = attempts.max(1);
                let mut last_error = None;
                for attempt in 1..=attempts {
                    match writer.append(buffer.as_slice()) {
                        Ok(()) => {
                            last_error = None;
                            break;
                        }
                        Err(e) => {
                            warn!(
                                "Flush of {count} record(s) to {} failed (attempt {attempt}/{attempts}): {e}",
                                writer.path().display()
                            );
                            last_error = Some(e);
                        }
                    }
                }
                if let Some(e) = last_error {
                    return Err(self.flush_error(writer.path(), count, e));
                }
            }
            FlushPolicy::BestEffort => {
                if let Err(e) = writer.append(buffer.as_slice()) {
                    warn!(
                        "Could not write {count} record(s) to {}, keeping them buffered: {e}",
                        writer.path().display()
                    );
                    return Ok(());
                }
            }
        }

        buffer.clear();
        state.written += count as u64;
        debug!("Flushed {count} record(s)");
        Ok(())
    }

    fn flush_error(&self, path: &Path, count: usize, source: Error) -> Error {
        let path = path.to_path_buf();
        let source = Box::new(source);
        match self.kind {
            SinkKind::Errors => Error::ErrorFlush {
                path,
                count,
                source,
            },
            SinkKind::Matches | SinkKind::Other => Error::ResultFlush {
                path,
                count,
                source,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ComparisonPair, ErrorType, FingerprintRecord};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Collects batches in memory; fails the first `failures` appends.
    struct FlakyWriter {
        batches: Arc<Mutex<Vec<Vec<u32>>>>,
        failures: Arc<AtomicU32>,
        path: PathBuf,
    }

    impl RecordWriter<u32> for FlakyWriter {
        fn append(&mut self, records: &[u32]) -> Result<()> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(())
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    fn flaky(failures: u32) -> (FlakyWriter, Arc<Mutex<Vec<Vec<u32>>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let writer = FlakyWriter {
            batches: Arc::clone(&batches),
            failures: Arc::new(AtomicU32::new(failures)),
            path: PathBuf::from("mem"),
        };
        (writer, batches)
    }

    #[test]
    fn test_flushes_at_capacity() {
        let (writer, batches) = flaky(0);
        let sink: BufferedSink<u32> = BufferedSink::new(Box::new(writer), 3, FlushPolicy::BestEffort);

        for n in 0..7 {
            sink.push(n).unwrap();
        }
        assert_eq!(batches.lock().unwrap().len(), 2);
        assert_eq!(sink.pending(), 1);

        sink.flush().unwrap();
        assert_eq!(*batches.lock().unwrap(), vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert_eq!(sink.written(), 7);
    }

    #[test]
    fn test_required_flush_retries_then_succeeds() {
        let (writer, batches) = flaky(2);
        let sink: BufferedSink<u32> = BufferedSink::new(
            Box::new(writer),
            10,
            FlushPolicy::Required { attempts: 3 },
        );
        sink.push(1).unwrap();
        sink.flush().unwrap();
        assert_eq!(*batches.lock().unwrap(), vec![vec![1]]);
    }

    #[test]
    fn test_required_flush_fails_after_attempts_and_keeps_buffer() {
        let (writer, batches) = flaky(3);
        let sink: BufferedSink<u32> = BufferedSink::new(
            Box::new(writer),
            10,
            FlushPolicy::Required { attempts: 3 },
        );
        sink.push(1).unwrap();

        let err = sink.flush().unwrap_err();
        assert!(matches!(err, Error::ResultFlush { count: 1, .. }));
        assert_eq!(sink.pending(), 1);
        assert!(batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_best_effort_flush_keeps_records_for_next_time() {
        let (writer, batches) = flaky(1);
        let sink: BufferedSink<u32> = BufferedSink::new(Box::new(writer), 10, FlushPolicy::BestEffort);
        sink.push(1).unwrap();

        sink.flush().unwrap();
        assert_eq!(sink.pending(), 1);

        sink.push(2).unwrap();
        sink.flush().unwrap();
        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2]]);
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn test_required_final_flush_of_best_effort_sink() {
        let (writer, batches) = flaky(4);
        let sink: BufferedSink<u32> = BufferedSink::new(Box::new(writer), 10, FlushPolicy::BestEffort);
        sink.push(1).unwrap();
        sink.flush().unwrap();

        assert!(sink.flush_required(3).is_err());
        assert_eq!(sink.pending(), 1);

        sink.flush_required(3).unwrap();
        assert_eq!(*batches.lock().unwrap(), vec![vec![1]]);
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn test_unwritable_error_sink_reports_error_flush() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let sink = ErrorSink::errors(blocker.join("errors.jsonl"), 10);
        let rec = |id: &str| {
            Arc::new(FingerprintRecord {
                entity_id: id.to_string(),
                variant_key: format!("{id}.mp3"),
                duration: 10.0,
                fingerprint: "1".to_string(),
                source: "s".to_string(),
                format: "mp3".to_string(),
            })
        };
        let pair = ComparisonPair::new(rec("a"), rec("b"));
        sink.push(ErrorRecord::new(&pair, ErrorType::ComparisonFailed, "boom"))
            .unwrap();

        sink.flush().unwrap();
        let err = sink.flush_required(2).unwrap_err();
        assert!(matches!(err, Error::ErrorFlush { count: 1, .. }));
    }

    #[test]
    fn test_match_sink_writes_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("m.jsonl");
        let sink = ResultSink::matches(&path, 500);
        assert_eq!(sink.path(), path);
        sink.flush().unwrap();
        assert!(!path.exists());
    }
}
