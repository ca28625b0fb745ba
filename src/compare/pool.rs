//! Bounded worker pools behind the [`ParallelCompare`] capability.

use super::{Comparator, checked_similarity};
use crate::constants::DEFAULT_WORKER_SHARE;
use crate::error::{Error, Result};
use crate::model::{ComparisonPair, ErrorType};
use crossbeam_channel::{Receiver, Sender};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Shared interrupt flag. Once set, workers stop starting new pairs.
pub type CancelToken = Arc<AtomicBool>;

/// What happened to one pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    /// The comparator produced a valid score.
    Similarity(f64),
    /// The comparison failed; the pair goes to the error sink.
    Failed {
        /// Failure category.
        error_type: ErrorType,
        /// Failure description.
        message: String,
    },
}

/// A pair together with its outcome.
#[derive(Debug, Clone)]
pub struct CompareResult {
    /// The compared pair.
    pub pair: ComparisonPair,
    /// Its outcome.
    pub outcome: PairOutcome,
}

/// Summary of one [`ParallelCompare::compare_all`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Pairs that produced an outcome (score or failure).
    pub attempted: usize,
    /// Pairs never started because the run was cancelled.
    pub abandoned: usize,
}

impl BatchReport {
    /// Every submitted pair was attempted.
    pub const fn is_complete(&self) -> bool {
        self.abandoned == 0
    }
}

/// Compares many pairs in parallel.
pub trait ParallelCompare {
    /// Number of concurrent workers.
    fn worker_count(&self) -> usize;

    /// Compare every pair and hand each result to `on_result` in completion
    /// order, on the calling thread.
    ///
    /// Returns once every pair is either attempted or abandoned due to
    /// cancellation. An error from `on_result` stops further work in this
    /// batch and is returned after in-flight pairs drain. Losing every
    /// worker fails the batch with [`Error::WorkerPool`].
    fn compare_all(
        &mut self,
        pairs: Vec<ComparisonPair>,
        on_result: &mut dyn FnMut(CompareResult) -> Result<()>,
    ) -> Result<BatchReport>;
}

/// Executes single comparisons on behalf of one worker slot.
pub(crate) trait PairExecutor: Send + 'static {
    fn execute(&mut self, pair: &ComparisonPair) -> PairOutcome;

    /// The slot can no longer compare anything and should stop taking pairs.
    fn retired(&self) -> bool {
        false
    }
}

enum WorkerEvent {
    Done(CompareResult),
    Abandoned,
    Retired(usize),
}

/// A fixed set of worker threads, each driving one [`PairExecutor`].
///
/// Jobs fan out over one shared queue and results fan in over one channel
/// read by the orchestrator.
pub struct WorkerPool {
    jobs: Option<Sender<ComparisonPair>>,
    events: Receiver<WorkerEvent>,
    handles: Vec<JoinHandle<()>>,
    abort: Arc<AtomicBool>,
    size: usize,
    live: usize,
}

impl WorkerPool {
    pub(crate) fn start<E: PairExecutor>(executors: Vec<E>, cancel: &CancelToken) -> Result<Self> {
        let size = executors.len();
        if size == 0 {
            return Err(Error::WorkerPool {
                reason: "at least one worker is required".to_string(),
            });
        }

        // One shared queue; idle workers compete for the next pair.
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<ComparisonPair>();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let abort = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(size);
        for (slot, executor) in executors.into_iter().enumerate() {
            let job_rx = job_rx.clone();
            let event_tx = event_tx.clone();
            let cancel = Arc::clone(cancel);
            let abort = Arc::clone(&abort);
            let handle = thread::Builder::new()
                .name(format!("compare-{slot}"))
                .spawn(move || worker_loop(slot, executor, &job_rx, &event_tx, &cancel, &abort))
                .map_err(|e| Error::WorkerPool {
                    reason: format!("failed to start worker thread: {e}"),
                })?;
            handles.push(handle);
        }

        debug!("Started worker pool with {size} worker(s)");
        Ok(Self {
            jobs: Some(job_tx),
            events: event_rx,
            handles,
            abort,
            size,
            live: size,
        })
    }
}

fn worker_loop<E: PairExecutor>(
    slot: usize,
    mut executor: E,
    jobs: &Receiver<ComparisonPair>,
    events: &Sender<WorkerEvent>,
    cancel: &AtomicBool,
    abort: &AtomicBool,
) {
    for pair in jobs {
        let event = if cancel.load(Ordering::SeqCst) || abort.load(Ordering::SeqCst) {
            WorkerEvent::Abandoned
        } else {
            let outcome = catch_unwind(AssertUnwindSafe(|| executor.execute(&pair)))
                .unwrap_or_else(|_| {
                    warn!("Worker {slot} panicked while comparing {}", pair.key());
                    PairOutcome::Failed {
                        error_type: ErrorType::Exception,
                        message: "worker panicked".to_string(),
                    }
                });
            WorkerEvent::Done(CompareResult { pair, outcome })
        };

        if events.send(event).is_err() {
            break;
        }

        if executor.retired() {
            warn!("Worker {slot} retired; remaining pairs go to the other workers");
            let _ = events.send(WorkerEvent::Retired(slot));
            break;
        }
    }
    debug!("Worker {slot} exiting");
}

impl ParallelCompare for WorkerPool {
    fn worker_count(&self) -> usize {
        self.size
    }

    fn compare_all(
        &mut self,
        pairs: Vec<ComparisonPair>,
        on_result: &mut dyn FnMut(CompareResult) -> Result<()>,
    ) -> Result<BatchReport> {
        self.abort.store(false, Ordering::SeqCst);
        if self.live == 0 {
            return Err(Error::WorkerPool {
                reason: "all comparison workers were retired".to_string(),
            });
        }
        let jobs = self.jobs.as_ref().ok_or_else(|| Error::WorkerPool {
            reason: "pool is shut down".to_string(),
        })?;

        let mut outstanding = pairs.len();
        for pair in pairs {
            jobs.send(pair).map_err(|_| Error::WorkerPool {
                reason: "all workers have exited".to_string(),
            })?;
        }

        let mut report = BatchReport::default();
        let mut failure = None;
        while outstanding > 0 {
            let event = self.events.recv().map_err(|_| Error::WorkerPool {
                reason: "workers exited with pairs outstanding".to_string(),
            })?;
            match event {
                WorkerEvent::Done(result) => {
                    outstanding -= 1;
                    report.attempted += 1;
                    if failure.is_none()
                        && let Err(e) = on_result(result)
                    {
                        self.abort.store(true, Ordering::SeqCst);
                        failure = Some(e);
                    }
                }
                WorkerEvent::Abandoned => {
                    outstanding -= 1;
                    report.abandoned += 1;
                }
                WorkerEvent::Retired(slot) => {
                    self.live = self.live.saturating_sub(1);
                    debug!("Worker {slot} retired, {} of {} still running", self.live, self.size);
                    if self.live == 0 {
                        return Err(failure.unwrap_or_else(|| Error::WorkerPool {
                            reason: format!(
                                "all comparison workers were retired with {outstanding} pair(s) outstanding"
                            ),
                        }));
                    }
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop.
        self.jobs.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

struct ComparatorExecutor<C> {
    comparator: C,
}

impl<C: Comparator + Send + 'static> PairExecutor for ComparatorExecutor<C> {
    fn execute(&mut self, pair: &ComparisonPair) -> PairOutcome {
        match self
            .comparator
            .compare(&pair.a, &pair.b)
            .and_then(checked_similarity)
        {
            Ok(similarity) => PairOutcome::Similarity(similarity),
            Err(e) => PairOutcome::Failed {
                error_type: ErrorType::ComparisonFailed,
                message: e.to_string(),
            },
        }
    }
}

/// Thread-backed pool. Each thread owns its own comparator built by the
/// factory, so comparators need not be `Sync`.
pub struct InProcessPool;

impl InProcessPool {
    /// Start `workers` threads.
    pub fn start<C, F>(workers: usize, factory: F, cancel: &CancelToken) -> Result<WorkerPool>
    where
        C: Comparator + Send + 'static,
        F: Fn() -> C,
    {
        let executors = (0..workers)
            .map(|_| ComparatorExecutor {
                comparator: factory(),
            })
            .collect();
        WorkerPool::start(executors, cancel)
    }
}

/// Default worker count: 90% of logical cores, at least one.
pub fn default_worker_count() -> usize {
    let cores = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let share = (cores as f64 * DEFAULT_WORKER_SHARE).floor() as usize;
    share.max(1)
}
