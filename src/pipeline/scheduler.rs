//! Cluster-by-cluster comparison scheduling.

use crate::checkpoint::CheckpointManager;
use crate::compare::{BatchReport, CancelToken, CompareResult, PairOutcome, ParallelCompare};
use crate::config::ScanMode;
use crate::constants::RESULT_FLUSH_ATTEMPTS;
use crate::constants::similarity::DECIMAL_PLACES;
use crate::error::{Error, Result};
use crate::model::{ComparisonPair, ErrorRecord, MatchRecord};
use crate::output::progress;
use crate::output::{ErrorSink, ResultSink};
use crate::pipeline::{Classifier, Cluster, RunPhase, RunState, RunStats, generate_pairs};
use crate::store::DeduplicationGuard;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Parameters of one sweep.
#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    /// Which source combinations are compared.
    pub mode: ScanMode,
    /// Minimum similarity recorded as a match.
    pub similarity_threshold: f64,
    /// Resume from the checkpoint if one matches.
    pub resume: bool,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    /// Final counters.
    pub stats: RunStats,
    /// Clusters in the run.
    pub clusters_total: usize,
    /// Clusters finished by this invocation.
    pub clusters_completed: usize,
    /// Clusters skipped because a checkpoint marked them complete.
    pub clusters_resumed: usize,
    /// Candidate pairs after the mode filter, before deduplication.
    pub candidate_pairs: u64,
    /// The run stopped early on an interrupt.
    pub interrupted: bool,
    /// Wall-clock time spent processing.
    pub elapsed: Duration,
}

impl RunReport {
    /// Clusters finished in total, resumed ones included.
    pub const fn clusters_done(&self) -> usize {
        self.clusters_completed + self.clusters_resumed
    }

    /// Convert an interrupted run into [`Error::Interrupted`].
    pub const fn into_result(self) -> Result<Self> {
        if self.interrupted {
            Err(Error::Interrupted {
                completed: self.clusters_done(),
                total: self.clusters_total,
            })
        } else {
            Ok(self)
        }
    }
}

/// Drives clusters through deduplication, the worker pool and the sinks.
///
/// Clusters run strictly one after another. Within a cluster every
/// surviving pair is submitted at once and results are consumed in
/// completion order. The cluster counts as complete only when every pair
/// has been attempted; only then is it checkpointed.
pub struct ComparisonScheduler {
    pool: Box<dyn ParallelCompare>,
    guard: DeduplicationGuard,
    results: ResultSink,
    errors: ErrorSink,
    classifier: Classifier,
    settings: ScanSettings,
    checkpoint: Option<CheckpointManager>,
    cancel: CancelToken,
    progress: bool,
    state: Mutex<RunState>,
}

impl ComparisonScheduler {
    /// Create a scheduler over a pool, the deduplication guard and the two
    /// sinks.
    pub fn new(
        pool: Box<dyn ParallelCompare>,
        guard: DeduplicationGuard,
        results: ResultSink,
        errors: ErrorSink,
        classifier: Classifier,
        settings: ScanSettings,
    ) -> Self {
        Self {
            pool,
            guard,
            results,
            errors,
            classifier,
            settings,
            checkpoint: None,
            cancel: CancelToken::default(),
            progress: false,
            state: Mutex::new(RunState::new()),
        }
    }

    /// Persist progress through `checkpoint`.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: CheckpointManager) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Observe `cancel` for interrupts.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Show a cluster progress bar.
    #[must_use]
    pub const fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, RunState>> {
        lock_state(&self.state)
    }

    /// Move the run to `phase`.
    pub fn advance(&self, phase: RunPhase) -> Result<()> {
        self.state()?.advance(phase);
        Ok(())
    }

    /// Current phase.
    pub fn phase(&self) -> Result<RunPhase> {
        Ok(self.state()?.phase())
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> Result<RunStats> {
        Ok(self.state()?.stats)
    }

    /// Process every cluster, resuming from the checkpoint when allowed.
    pub fn run(&mut self, clusters: &[Cluster]) -> Result<RunReport> {
        let started = Instant::now();
        let total = clusters.len();
        self.advance(RunPhase::Processing)?;

        let mut resumed = 0;
        if let Some(checkpoint) = self.checkpoint.as_mut() {
            if self.settings.resume {
                if let Some(saved) = checkpoint.load(total) {
                    resumed = saved.completed_clusters.len();
                    let mut state = lock_state(&self.state)?;
                    state.stats = saved.stats;
                    state.clusters_resumed = resumed;
                }
            } else {
                checkpoint.discard();
            }
        }

        let pb = progress::create_cluster_progress(total, resumed, self.progress);
        let mut interrupted = false;
        let mut candidate_pairs = 0u64;

        for (index, cluster) in clusters.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }
            if self
                .checkpoint
                .as_ref()
                .is_some_and(|c| c.is_completed(index))
            {
                debug!("Cluster {index} already complete, skipping");
                continue;
            }

            let pairs = generate_pairs(cluster, self.settings.mode);
            candidate_pairs += pairs.len() as u64;
            debug!(
                "Cluster {index}: {} record(s), {:.1}-{:.1}s, {} candidate pair(s)",
                cluster.len(),
                cluster.min_duration(),
                cluster.max_duration(),
                pairs.len()
            );

            let batch = self.process_unit(pairs)?;
            self.flush_sinks()?;

            if !batch.is_complete() {
                warn!(
                    "Cluster {index} interrupted with {} pair(s) not attempted; it will be redone on resume",
                    batch.abandoned
                );
                interrupted = true;
                break;
            }

            let stats = {
                let mut state = self.state()?;
                state.clusters_completed += 1;
                state.stats
            };
            if let Some(checkpoint) = self.checkpoint.as_mut() {
                checkpoint.save(index, total, stats);
            }
            progress::inc_progress(
                pb.as_ref(),
                format!("{} dupes, {} errors", stats.duplicates, stats.errors),
            );
        }

        progress::finish_progress(pb, if interrupted { "interrupted" } else { "done" });
        self.finish(interrupted)?;

        let state = self.state()?;
        if interrupted {
            info!(
                "Stopped after {}/{total} cluster(s); rerun to resume",
                state.clusters_completed + state.clusters_resumed
            );
        } else {
            info!("Processed {total} cluster(s): {}", state.stats);
        }
        Ok(RunReport {
            stats: state.stats,
            clusters_total: total,
            clusters_completed: state.clusters_completed,
            clusters_resumed: state.clusters_resumed,
            candidate_pairs,
            interrupted,
            elapsed: started.elapsed(),
        })
    }

    /// Replay explicit pairs in batches of `batch_size`, without checkpoints.
    ///
    /// Used to retry failed pairs: the same dedup, compare and sink path as
    /// a regular run, minus clustering.
    pub fn run_batches(&mut self, pairs: Vec<ComparisonPair>, batch_size: usize) -> Result<RunReport> {
        let started = Instant::now();
        self.advance(RunPhase::Processing)?;

        let total = pairs.len();
        let candidate_pairs = total as u64;
        let batch_size = batch_size.max(1);
        let batches = total.div_ceil(batch_size);
        let pb = progress::create_cluster_progress(batches, 0, self.progress);

        let mut interrupted = false;
        let mut completed = 0;
        let mut pairs = pairs.into_iter();
        loop {
            let chunk: Vec<_> = pairs.by_ref().take(batch_size).collect();
            if chunk.is_empty() {
                break;
            }
            if self.cancel.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }
            let batch = self.process_unit(chunk)?;
            self.flush_sinks()?;
            if !batch.is_complete() {
                interrupted = true;
                break;
            }
            completed += 1;
            let stats = self.stats()?;
            progress::inc_progress(
                pb.as_ref(),
                format!("{} recovered, {} errors", stats.duplicates, stats.errors),
            );
        }

        progress::finish_progress(pb, if interrupted { "interrupted" } else { "done" });
        self.finish(false)?;

        Ok(RunReport {
            stats: self.stats()?,
            clusters_total: batches,
            clusters_completed: completed,
            clusters_resumed: 0,
            candidate_pairs,
            interrupted,
            elapsed: started.elapsed(),
        })
    }

    /// Deduplicate, compare and record one unit of work.
    fn process_unit(&mut self, pairs: Vec<ComparisonPair>) -> Result<BatchReport> {
        let mut fresh = Vec::with_capacity(pairs.len());
        let mut skipped = 0u64;
        for pair in pairs {
            if self.guard.exists(&pair)? {
                skipped += 1;
            } else {
                fresh.push(pair);
            }
        }
        self.state()?.stats.skipped += skipped;
        if fresh.is_empty() {
            return Ok(BatchReport::default());
        }

        let Self {
            pool,
            guard,
            results,
            errors,
            classifier,
            settings,
            state,
            ..
        } = self;
        let threshold = settings.similarity_threshold;
        pool.compare_all(fresh, &mut |result| {
            record_outcome(result, threshold, classifier, guard, results, errors, state)
        })
    }

    fn flush_sinks(&self) -> Result<()> {
        self.results.flush()?;
        self.errors.flush()
    }

    fn finish(&self, interrupted: bool) -> Result<()> {
        self.advance(RunPhase::Flushing)?;
        self.results.flush()?;
        // Last chance for buffered error records; losing them fails the run.
        self.errors.flush_required(RESULT_FLUSH_ATTEMPTS)?;
        if !interrupted && let Some(checkpoint) = self.checkpoint.as_ref() {
            checkpoint.cleanup();
        }
        self.advance(RunPhase::Done)
    }
}

fn lock_state(state: &Mutex<RunState>) -> Result<MutexGuard<'_, RunState>> {
    state.lock().map_err(|_| Error::Internal {
        message: "run state mutex poisoned".to_string(),
    })
}

/// Fold one worker result into the sinks and counters.
fn record_outcome(
    result: CompareResult,
    threshold: f64,
    classifier: &Classifier,
    guard: &mut DeduplicationGuard,
    results: &ResultSink,
    errors: &ErrorSink,
    state: &Mutex<RunState>,
) -> Result<()> {
    let CompareResult { pair, outcome } = result;
    match outcome {
        PairOutcome::Similarity(similarity) => {
            let matched = similarity >= threshold;
            if matched {
                let kind = classifier.classify(&pair, similarity);
                debug!(
                    "Match {} ({similarity:.prec$}, {kind})",
                    pair.key(),
                    prec = DECIMAL_PLACES
                );
                results.push(MatchRecord::new(&pair, similarity, kind))?;
                guard.remember(pair.key());
            }
            let mut state = lock_state(state)?;
            state.stats.comparisons += 1;
            if matched {
                state.stats.duplicates += 1;
            }
        }
        PairOutcome::Failed {
            error_type,
            message,
        } => {
            warn!("Comparison failed for {}: {error_type}: {message}", pair.key());
            errors.push(ErrorRecord::new(&pair, error_type, message))?;
            lock_state(state)?.stats.errors += 1;
        }
    }
    Ok(())
}
