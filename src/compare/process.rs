//! Child-process worker pool.
//!
//! Each slot owns one `dupescan worker` child and talks to it over stdin and
//! stdout using the JSON Lines protocol. A crashed child is replaced before
//! the next pair; the pair in flight is reported as an `EXCEPTION` failure.
//! A slot whose child keeps crashing is retired.

use super::pool::{CancelToken, PairExecutor, PairOutcome, WorkerPool};
use super::{WorkerReply, WorkerRequest, checked_similarity};
use crate::constants::worker::{MAX_CONSECUTIVE_CRASHES, SHUTDOWN_GRACE, SUBCOMMAND};
use crate::error::{Error, Result};
use crate::model::{ComparisonPair, ErrorType};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Command line used to start a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments passed to it.
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Arbitrary program and arguments.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-invoke the running executable as a worker.
    pub fn current_exe(max_offset: usize) -> Result<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::new(
            program,
            vec![
                SUBCOMMAND.to_string(),
                "--max-offset".to_string(),
                max_offset.to_string(),
            ],
        ))
    }

    fn spawn(&self, runtime: &Runtime) -> Result<WorkerProcess> {
        // Pipes register with the reactor of the slot's runtime.
        let _context = runtime.enter();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::WorkerSpawn {
                program: self.program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(Error::WorkerPool {
                reason: "worker pipes were not captured".to_string(),
            });
        };

        Ok(WorkerProcess {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
        })
    }
}

struct WorkerProcess {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    async fn exchange(&mut self, request: &WorkerRequest) -> std::result::Result<WorkerReply, String> {
        let mut line = serde_json::to_string(request).map_err(|e| e.to_string())?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| format!("worker input failed: {e}"))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| format!("worker input failed: {e}"))?;

        let mut reply = String::new();
        let read = self
            .stdout
            .read_line(&mut reply)
            .await
            .map_err(|e| format!("worker output failed: {e}"))?;
        if read == 0 {
            return Err("worker process exited unexpectedly".to_string());
        }
        serde_json::from_str(reply.trim()).map_err(|e| format!("malformed worker reply: {e}"))
    }

    /// Close stdin and give the child [`SHUTDOWN_GRACE`] to exit.
    async fn shutdown(self) {
        let Self {
            mut child, stdin, ..
        } = self;
        // EOF on stdin ends the worker's serve loop.
        drop(stdin);
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!("Worker process exited with {status}"),
            Ok(Err(e)) => warn!("Could not wait for worker process: {e}"),
            Err(_) => {
                warn!(
                    "Worker process still running after {}s, killing it",
                    SHUTDOWN_GRACE.as_secs()
                );
                let _ = child.kill().await;
            }
        }
    }

    async fn kill(mut self) {
        let _ = self.child.kill().await;
    }
}

struct ProcessExecutor {
    slot: usize,
    command: WorkerCommand,
    runtime: Runtime,
    process: Option<WorkerProcess>,
    crashes: u32,
    next_id: u64,
}

impl ProcessExecutor {
    fn start(slot: usize, command: &WorkerCommand) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::WorkerPool {
                reason: format!("failed to create worker runtime: {e}"),
            })?;
        let process = command.spawn(&runtime)?;
        Ok(Self {
            slot,
            command: command.clone(),
            runtime,
            process: Some(process),
            crashes: 0,
            next_id: 0,
        })
    }

    fn exchange(&mut self, request: &WorkerRequest) -> std::result::Result<WorkerReply, String> {
        if self.process.is_none() {
            warn!(
                "Respawning worker {} ({} consecutive crash(es))",
                self.slot, self.crashes
            );
            let process = self
                .command
                .spawn(&self.runtime)
                .map_err(|e| e.to_string())?;
            self.process = Some(process);
        }
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| "worker process unavailable".to_string())?;
        self.runtime.block_on(process.exchange(request))
    }

    /// Kill the current child and charge the slot one crash.
    fn crashed(&mut self, message: String) -> PairOutcome {
        self.crashes += 1;
        if let Some(process) = self.process.take() {
            self.runtime.block_on(process.kill());
        }
        PairOutcome::Failed {
            error_type: ErrorType::Exception,
            message,
        }
    }
}

impl PairExecutor for ProcessExecutor {
    fn execute(&mut self, pair: &ComparisonPair) -> PairOutcome {
        let id = self.next_id;
        self.next_id += 1;
        let request = WorkerRequest {
            id,
            a: (*pair.a).clone(),
            b: (*pair.b).clone(),
        };

        let reply = match self.exchange(&request) {
            Ok(reply) => reply,
            Err(message) => return self.crashed(message),
        };

        match reply {
            WorkerReply::Ok {
                id: reply_id,
                similarity,
            } if reply_id == id => {
                self.crashes = 0;
                match checked_similarity(similarity) {
                    Ok(similarity) => PairOutcome::Similarity(similarity),
                    Err(e) => PairOutcome::Failed {
                        error_type: ErrorType::ComparisonFailed,
                        message: e.to_string(),
                    },
                }
            }
            WorkerReply::Failed {
                id: reply_id,
                message,
            } if reply_id == id => {
                self.crashes = 0;
                PairOutcome::Failed {
                    error_type: ErrorType::ComparisonFailed,
                    message,
                }
            }
            WorkerReply::Panicked {
                id: reply_id,
                message,
            } if reply_id == id => {
                self.crashes = 0;
                PairOutcome::Failed {
                    error_type: ErrorType::Exception,
                    message,
                }
            }
            WorkerReply::Rejected { message } => {
                self.crashed(format!("worker rejected request: {message}"))
            }
            WorkerReply::Ok { .. } | WorkerReply::Failed { .. } | WorkerReply::Panicked { .. } => {
                self.crashed(format!("worker reply out of sequence (expected id {id})"))
            }
        }
    }

    fn retired(&self) -> bool {
        self.crashes >= MAX_CONSECUTIVE_CRASHES
    }
}

impl Drop for ProcessExecutor {
    fn drop(&mut self) {
        if let Some(process) = self.process.take() {
            self.runtime.block_on(process.shutdown());
        }
    }
}

/// Pool of worker child processes.
pub struct ProcessPool;

impl ProcessPool {
    /// Spawn `workers` children running `command`.
    ///
    /// Children are started eagerly so that a bad command fails the run
    /// before any cluster is processed.
    pub fn start(workers: usize, command: &WorkerCommand, cancel: &CancelToken) -> Result<WorkerPool> {
        let executors = (0..workers)
            .map(|slot| ProcessExecutor::start(slot, command))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Spawned {workers} worker process(es): {}",
            command.program.display()
        );
        WorkerPool::start(executors, cancel)
    }
}
