//! Application-wide constants.
//!
//! Tunables that end up in configuration defaults live here so the config
//! types, CLI help and tests agree on them.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "dupescan";

/// Default minimum similarity for a pair to be recorded as a match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.80;

/// Default duration clustering tolerance in seconds.
pub const DEFAULT_DURATION_TOLERANCE: f64 = 5.0;

/// Default number of buffered records before a sink flushes.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Share of logical cores used for comparison workers when none is configured.
pub const DEFAULT_WORKER_SHARE: f64 = 0.9;

/// Default output file name stem (mode is appended).
pub const DEFAULT_OUTPUT_STEM: &str = "duplicate_results";

/// Lock file extension appended to the output path.
pub const LOCK_FILE_EXTENSION: &str = ".dupescan.lock";

/// Checkpoint file extension appended to the output path.
pub const CHECKPOINT_EXTENSION: &str = ".checkpoint.json";

/// Suffix inserted before `.jsonl` for the error output file.
pub const ERROR_FILE_SUFFIX: &str = "_errors";

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Attempts for a required flush (every match flush, and the final error
/// flush) before the run fails.
pub const RESULT_FLUSH_ATTEMPTS: u32 = 3;

/// Default classification thresholds.
pub mod classification {
    /// Similarity at or above which a pair is considered identical content.
    pub const IDENTICAL: f64 = 0.95;
    /// Similarity at or above which a pair is highly similar.
    pub const HIGH_SIMILARITY: f64 = 0.80;
    /// Similarity at or above which a pair is a related version.
    pub const RELATED: f64 = 0.60;
}

/// Similarity bounds.
pub mod similarity {
    /// Minimum valid similarity.
    pub const MIN: f64 = 0.0;
    /// Maximum valid similarity.
    pub const MAX: f64 = 1.0;
    /// Decimal places for similarity formatting.
    pub const DECIMAL_PLACES: usize = 4;
}

/// Built-in comparator constants.
pub mod comparator {
    /// Default maximum alignment offset, in sub-fingerprint frames.
    pub const DEFAULT_MAX_OFFSET: usize = 80;
    /// Largest accepted maximum alignment offset.
    pub const MAX_OFFSET_LIMIT: usize = 10_000;
    /// Bits per raw Chromaprint sub-fingerprint.
    pub const BITS_PER_FRAME: u32 = 32;
}

/// Process pool constants.
pub mod worker {
    /// Hidden subcommand name used to start a comparison worker.
    pub const SUBCOMMAND: &str = "worker";
    /// Back-to-back crashes after which a worker slot is retired. Any
    /// answered request resets the count.
    pub const MAX_CONSECUTIVE_CRASHES: u32 = 5;
    /// How long a child gets to exit after its stdin is closed.
    pub const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(2);
}

/// UTF-8 Byte Order Mark for spreadsheet compatibility in CSV files.
pub const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";
