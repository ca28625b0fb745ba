//! Run lock preventing two sweeps from writing the same output.

use crate::config::lock_path_for;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Lock file content for debugging.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that holds the lock.
    pub pid: u32,
    /// Hostname of the machine.
    pub hostname: String,
    /// When the lock was acquired.
    pub started: DateTime<Utc>,
    /// Match output the run is writing.
    pub output: PathBuf,
}

/// RAII guard for the run lock.
#[derive(Debug)]
pub struct RunLock {
    lock_path: PathBuf,
}

impl RunLock {
    /// Acquire the lock for a run writing to `output`.
    ///
    /// The lock file sits next to the output and is created exclusively, so
    /// a concurrent run on the same output fails with [`Error::RunLocked`].
    pub fn acquire(output: &Path) -> Result<Self> {
        let lock_path = lock_path_for(output);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| Error::LockCreate {
                path: lock_path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path);

        match file {
            Ok(mut f) => {
                let info = LockInfo {
                    pid: std::process::id(),
                    hostname: hostname::get().map_or_else(
                        |_| "unknown".to_string(),
                        |h| h.to_string_lossy().into_owned(),
                    ),
                    started: Utc::now(),
                    output: output.to_path_buf(),
                };

                let json = serde_json::to_string_pretty(&info).unwrap_or_else(|_| "{}".to_string());
                let _ = f.write_all(json.as_bytes());

                register_lock(&lock_path);
                Ok(Self { lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::RunLocked { path: lock_path })
            }
            Err(e) => Err(Error::LockCreate {
                path: lock_path,
                source: e,
            }),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Read the holder information of an existing lock, if any.
    pub fn holder(output: &Path) -> Option<LockInfo> {
        let contents = fs::read_to_string(lock_path_for(output)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Remove a lock left behind by a crashed run.
    pub fn remove_stale(output: &Path) -> Result<()> {
        let lock_path = lock_path_for(output);
        fs::remove_file(&lock_path).map_err(|e| Error::LockRemove {
            path: lock_path,
            source: e,
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
        unregister_lock(&self.lock_path);
    }
}

/// Global registry of active lock paths for cleanup on signal.
static ACTIVE_LOCKS: std::sync::LazyLock<std::sync::Mutex<Vec<PathBuf>>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(Vec::new()));

fn register_lock(path: &Path) {
    if let Ok(mut locks) = ACTIVE_LOCKS.lock() {
        locks.push(path.to_path_buf());
    }
}

fn unregister_lock(path: &Path) {
    if let Ok(mut locks) = ACTIVE_LOCKS.lock() {
        locks.retain(|p| p != path);
    }
}

/// Remove every held lock file. Called from the interrupt handler before a
/// forced exit, when destructors will not run.
pub fn cleanup_all_locks() {
    if let Ok(locks) = ACTIVE_LOCKS.lock() {
        for lock_path in locks.iter() {
            let _ = fs::remove_file(lock_path);
        }
    }
}
