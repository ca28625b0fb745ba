//! Error types for dupescan.

/// Result type alias for dupescan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for dupescan.
///
/// Failures of a single comparison are not represented here; they travel as
/// [`CompareError`](crate::compare::CompareError) inside a pair outcome and
/// end up in the error sink instead of aborting the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Failed to open or read the fingerprint feed.
    #[error("failed to read fingerprint input '{path}'")]
    InputRead {
        /// Path to the input file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line of the fingerprint feed is not valid JSON.
    #[error("invalid fingerprint record at {path}:{line}")]
    InputParse {
        /// Path to the input file.
        path: std::path::PathBuf,
        /// One-based line number.
        line: usize,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Not enough usable records to compare anything.
    #[error("need at least two fingerprint records, found {found}")]
    NotEnoughRecords {
        /// Number of usable records.
        found: usize,
    },

    /// Flushing confirmed matches to durable storage failed.
    #[error("failed to flush {count} match record(s) to '{path}'")]
    ResultFlush {
        /// Destination path.
        path: std::path::PathBuf,
        /// Number of records in the failed batch.
        count: usize,
        /// Last write failure.
        #[source]
        source: Box<Self>,
    },

    /// Flushing error records failed.
    #[error("failed to flush {count} error record(s) to '{path}'")]
    ErrorFlush {
        /// Destination path.
        path: std::path::PathBuf,
        /// Number of records in the failed batch.
        count: usize,
        /// Last write failure.
        #[source]
        source: Box<Self>,
    },

    /// Failed to serialize an output record.
    #[error("failed to serialize output record")]
    RecordSerialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write the checkpoint file.
    #[error("failed to write checkpoint '{path}'")]
    CheckpointWrite {
        /// Path to the checkpoint file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read or parse the checkpoint file.
    #[error("failed to read checkpoint '{path}': {reason}")]
    CheckpointRead {
        /// Path to the checkpoint file.
        path: std::path::PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Failed to start a comparison worker process.
    #[error("failed to spawn comparison worker '{program}'")]
    WorkerSpawn {
        /// Program that was launched.
        program: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The worker pool lost every worker and cannot make progress.
    #[error("comparison worker pool unavailable: {reason}")]
    WorkerPool {
        /// Description of the failure.
        reason: String,
    },

    /// Another run already holds the lock for this output.
    #[error("output is locked by another run: {path}")]
    RunLocked {
        /// Path to the lock file.
        path: std::path::PathBuf,
    },

    /// Failed to create lock file.
    #[error("failed to create lock file '{path}'")]
    LockCreate {
        /// Path to the lock file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove lock file.
    #[error("failed to remove lock file '{path}'")]
    LockRemove {
        /// Path to the lock file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a previously written match or error file.
    #[error("failed to read record file '{path}'")]
    RecordFileRead {
        /// Path to the record file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write CSV export.
    #[error("failed to write CSV export '{path}'")]
    CsvWrite {
        /// Path to the CSV file.
        path: std::path::PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// The run was interrupted before all clusters completed.
    #[error("run interrupted after {completed} of {total} cluster(s)")]
    Interrupted {
        /// Clusters fully completed (including resumed ones).
        completed: usize,
        /// Total clusters in the run.
        total: usize,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Process exit code for this error.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted { .. } => 130,
            _ => 1,
        }
    }
}
