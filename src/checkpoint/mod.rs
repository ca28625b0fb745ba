//! Crash and interrupt recovery at cluster granularity.

mod manager;

pub use manager::{Checkpoint, CheckpointManager, CheckpointSettings};
