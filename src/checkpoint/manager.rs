//! Cluster-level checkpoint persistence.

use crate::config::ScanMode;
use crate::constants::CHECKPOINT_VERSION;
use crate::error::{Error, Result};
use crate::pipeline::RunStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Settings a checkpoint was produced under. A checkpoint is only reused
/// by a run with the same settings, since they determine the clusters and
/// which pairs count as matches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckpointSettings {
    /// Scan mode.
    pub mode: ScanMode,
    /// Match threshold.
    pub similarity_threshold: f64,
    /// Clustering tolerance in seconds.
    pub duration_tolerance: f64,
}

impl CheckpointSettings {
    fn same_as(&self, other: &Self) -> bool {
        self.mode == other.mode
            && (self.similarity_threshold - other.similarity_threshold).abs() < 1e-9
            && (self.duration_tolerance - other.duration_tolerance).abs() < 1e-9
    }
}

/// On-disk checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Format version.
    pub version: u32,
    /// When the checkpoint was written.
    pub timestamp: DateTime<Utc>,
    /// Indices of fully processed clusters.
    pub completed_clusters: BTreeSet<usize>,
    /// Number of clusters in the run.
    pub total_clusters: usize,
    /// Cumulative statistics at the time of writing.
    pub stats: RunStats,
    /// Settings of the run that wrote it.
    pub settings: CheckpointSettings,
}

/// Owns the checkpoint file of one run.
#[derive(Debug)]
pub struct CheckpointManager {
    path: PathBuf,
    settings: CheckpointSettings,
    completed: BTreeSet<usize>,
}

impl CheckpointManager {
    /// Manager for the checkpoint at `path`.
    pub fn new(path: impl Into<PathBuf>, settings: CheckpointSettings) -> Self {
        Self {
            path: path.into(),
            settings,
            completed: BTreeSet::new(),
        }
    }

    /// Path of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a usable checkpoint for a run with `total_clusters` clusters.
    ///
    /// Missing, corrupt, outdated or mismatched checkpoints are ignored with
    /// a warning; the run then starts fresh.
    pub fn load(&mut self, total_clusters: usize) -> Option<Checkpoint> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Ignoring unreadable checkpoint {}: {e}", self.path.display());
                return None;
            }
        };

        let checkpoint: Checkpoint = match serde_json::from_str(&contents) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!("Ignoring corrupt checkpoint {}: {e}", self.path.display());
                return None;
            }
        };

        if checkpoint.version != CHECKPOINT_VERSION {
            warn!(
                "Ignoring checkpoint with unsupported version {} (expected {CHECKPOINT_VERSION})",
                checkpoint.version
            );
            return None;
        }
        if !checkpoint.settings.same_as(&self.settings) {
            warn!(
                "Ignoring checkpoint written with different settings (mode {}, threshold {}, tolerance {}s)",
                checkpoint.settings.mode,
                checkpoint.settings.similarity_threshold,
                checkpoint.settings.duration_tolerance
            );
            return None;
        }
        if checkpoint.total_clusters != total_clusters {
            warn!(
                "Ignoring checkpoint for {} cluster(s); this run has {total_clusters}",
                checkpoint.total_clusters
            );
            return None;
        }

        info!(
            "Resuming from checkpoint: {}/{} cluster(s) already complete",
            checkpoint.completed_clusters.len(),
            checkpoint.total_clusters
        );
        self.completed.clone_from(&checkpoint.completed_clusters);
        Some(checkpoint)
    }

    /// Whether a cluster was completed in this or a resumed run.
    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    /// Completed cluster indices.
    pub fn completed(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    /// Mark a cluster complete and persist progress.
    ///
    /// A write failure is logged and otherwise ignored; the cost is redoing
    /// the cluster after a crash.
    pub fn save(&mut self, index: usize, total_clusters: usize, stats: RunStats) {
        self.completed.insert(index);
        if let Err(e) = self.try_save(total_clusters, stats) {
            warn!("Checkpoint not saved: {e}");
        }
    }

    /// Persist the current progress atomically: write a temporary file,
    /// sync it, then rename it over the checkpoint.
    pub fn try_save(&self, total_clusters: usize, stats: RunStats) -> Result<()> {
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            timestamp: Utc::now(),
            completed_clusters: self.completed.clone(),
            total_clusters,
            stats,
            settings: self.settings,
        };
        let json = serde_json::to_vec_pretty(&checkpoint)
            .map_err(|source| Error::RecordSerialize { source })?;

        let write_error = |source| Error::CheckpointWrite {
            path: self.path.clone(),
            source,
        };
        let tmp = temp_path(&self.path);
        let mut file = File::create(&tmp).map_err(write_error)?;
        file.write_all(&json).map_err(write_error)?;
        file.sync_all().map_err(write_error)?;
        drop(file);
        replace_file(&tmp, &self.path).map_err(write_error)?;

        debug!(
            "Checkpoint saved: {}/{total_clusters} cluster(s)",
            self.completed.len()
        );
        Ok(())
    }

    /// Delete the checkpoint after a fully completed run.
    pub fn cleanup(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed checkpoint {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove checkpoint {}: {e}", self.path.display()),
        }
    }

    /// Forget progress and remove any checkpoint on disk.
    pub fn discard(&mut self) {
        self.completed.clear();
        if self.path.exists() {
            info!("Discarding checkpoint {}", self.path.display());
        }
        self.cleanup();
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn replace_file(from: &Path, to: &Path) -> std::io::Result<()> {
    #[cfg(windows)]
    if to.exists() {
        fs::remove_file(to)?;
    }
    fs::rename(from, to)
}
