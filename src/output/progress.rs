//! Progress bar utilities for cluster processing.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar over the clusters of a run.
///
/// Already-completed clusters from a resumed run start the bar at `done`.
pub fn create_cluster_progress(total: usize, done: usize, enabled: bool) -> Option<ProgressBar> {
    if !enabled || total == 0 {
        return None;
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} clusters ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ "),
    );
    pb.set_position(done as u64);
    Some(pb)
}

/// Finish a progress bar with a message.
pub fn finish_progress(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(message.to_string());
    }
}

/// Advance a progress bar by one cluster and show the running tallies.
pub fn inc_progress(pb: Option<&ProgressBar>, message: impl Into<String>) {
    if let Some(pb) = pb {
        pb.set_message(message.into());
        pb.inc(1);
    }
}
