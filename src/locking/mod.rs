//! Run-level locking.

mod file_lock;

pub use file_lock::{LockInfo, RunLock, cleanup_all_locks};
