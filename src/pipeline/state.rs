//! Run-level state: the phase machine and aggregate statistics.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Phases of a scan, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    /// Configuration resolved, nothing loaded yet.
    Initializing,
    /// Reading the fingerprint feed.
    LoadingData,
    /// Grouping records by duration.
    Clustering,
    /// Dispatching pairs cluster by cluster.
    Processing,
    /// Draining sink buffers.
    Flushing,
    /// Finished; summary available.
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "INITIALIZING",
            Self::LoadingData => "LOADING_DATA",
            Self::Clustering => "CLUSTERING",
            Self::Processing => "PROCESSING",
            Self::Flushing => "FLUSHING",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Counters reported at the end of every run and snapshotted into the
/// checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Comparisons that produced a score.
    pub comparisons: u64,
    /// Scores at or above the threshold.
    pub duplicates: u64,
    /// Pairs skipped because they were already resolved.
    pub skipped: u64,
    /// Pairs whose comparison failed.
    pub errors: u64,
}

impl RunStats {
    /// Add another snapshot to this one.
    pub const fn absorb(&mut self, other: &Self) {
        self.comparisons += other.comparisons;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} comparisons, {} duplicates, {} skipped, {} errors",
            self.comparisons, self.duplicates, self.skipped, self.errors
        )
    }
}

/// Mutable state of one run, owned by the orchestrator.
///
/// Workers never touch this; the scheduler folds their results in under a
/// single mutex.
#[derive(Debug)]
pub struct RunState {
    phase: RunPhase,
    /// Aggregate counters.
    pub stats: RunStats,
    /// Clusters fully processed in this run.
    pub clusters_completed: usize,
    /// Clusters skipped because a checkpoint marked them complete.
    pub clusters_resumed: usize,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// Fresh state in [`RunPhase::Initializing`].
    pub const fn new() -> Self {
        Self {
            phase: RunPhase::Initializing,
            stats: RunStats {
                comparisons: 0,
                duplicates: 0,
                skipped: 0,
                errors: 0,
            },
            clusters_completed: 0,
            clusters_resumed: 0,
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Move to `next`. Phases only move forward; staying put is a no-op and
    /// going backwards is ignored with a debug note.
    pub fn advance(&mut self, next: RunPhase) {
        if next > self.phase {
            info!("Run phase: {} -> {}", self.phase, next);
            self.phase = next;
        } else if next < self.phase {
            debug!("Ignoring backwards phase change {} -> {}", self.phase, next);
        }
    }
}
