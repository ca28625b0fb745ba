//! Processing pipeline components.

mod classify;
mod cluster;
mod pairs;
mod scheduler;
mod state;

pub use classify::Classifier;
pub use cluster::{Cluster, cluster_by_duration, pair_count};
pub use pairs::generate_pairs;
pub use scheduler::{ComparisonScheduler, RunReport, ScanSettings};
pub use state::{RunPhase, RunState, RunStats};
