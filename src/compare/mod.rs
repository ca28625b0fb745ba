//! Fingerprint comparison: the comparator capability and the worker pools
//! that run it in parallel.
//!
//! The scheduler only sees [`ParallelCompare`]. Whether comparisons run in
//! child processes ([`ProcessPool`]) or on threads ([`InProcessPool`]) is an
//! implementation detail of the pool.

mod comparator;
mod pool;
mod process;
mod protocol;
mod worker;

pub use comparator::{CompareError, Comparator, RawFingerprintComparator, checked_similarity};
pub use pool::{
    BatchReport, CancelToken, CompareResult, InProcessPool, PairOutcome, ParallelCompare,
    WorkerPool, default_worker_count,
};
pub use process::{ProcessPool, WorkerCommand};
pub use protocol::{WorkerReply, WorkerRequest};
pub use worker::serve;
