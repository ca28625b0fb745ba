//! Replay of failed comparisons.
//!
//! An error file from a previous run is analysed, optionally filtered by
//! error type, re-joined with the input feed and pushed through the same
//! scheduler as a regular run.

mod analysis;
mod replay;

pub use analysis::ErrorAnalysis;
pub use replay::{ReplayPlan, build_replay_pairs};
