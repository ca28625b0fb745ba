//! JSON Lines protocol between the pool and worker processes.
//!
//! One request line in, one reply line out, strictly alternating.

use crate::model::FingerprintRecord;
use serde::{Deserialize, Serialize};

/// Ask a worker to compare two records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Correlation id echoed in the reply.
    pub id: u64,
    /// First record.
    pub a: FingerprintRecord,
    /// Second record.
    pub b: FingerprintRecord,
}

/// A worker's answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    /// The comparator produced a score.
    Ok {
        /// Correlation id.
        id: u64,
        /// Similarity score.
        similarity: f64,
    },
    /// The comparator failed for this pair.
    Failed {
        /// Correlation id.
        id: u64,
        /// Failure description.
        message: String,
    },
    /// The comparator panicked; the worker survived and keeps serving.
    Panicked {
        /// Correlation id.
        id: u64,
        /// Panic description.
        message: String,
    },
    /// The worker could not read the request at all.
    Rejected {
        /// Why the request was rejected.
        message: String,
    },
}
