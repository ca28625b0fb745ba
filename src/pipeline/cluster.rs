//! Duration-based clustering.
//!
//! Records whose durations differ by more than the tolerance cannot be
//! duplicates of each other, so only records inside one cluster are ever
//! compared. This turns an all-pairs sweep into many small ones.

use crate::model::FingerprintRecord;
use std::sync::Arc;
use tracing::info;

/// A run of duration-sorted records close enough to compare pairwise.
///
/// Always holds at least two members.
#[derive(Debug, Clone)]
pub struct Cluster {
    members: Vec<Arc<FingerprintRecord>>,
    min_duration: f64,
    max_duration: f64,
}

impl Cluster {
    fn start(record: Arc<FingerprintRecord>) -> Self {
        let duration = record.duration;
        Self {
            members: vec![record],
            min_duration: duration,
            max_duration: duration,
        }
    }

    /// A record joins if it is within `tolerance` of both the running
    /// minimum and the running maximum.
    fn accepts(&self, duration: f64, tolerance: f64) -> bool {
        duration - self.min_duration <= tolerance && duration - self.max_duration <= tolerance
    }

    fn push(&mut self, record: Arc<FingerprintRecord>) {
        self.min_duration = self.min_duration.min(record.duration);
        self.max_duration = self.max_duration.max(record.duration);
        self.members.push(record);
    }

    /// Members in insertion (ascending duration) order.
    pub fn members(&self) -> &[Arc<FingerprintRecord>] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; clusters are never empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Shortest member duration.
    pub const fn min_duration(&self) -> f64 {
        self.min_duration
    }

    /// Longest member duration.
    pub const fn max_duration(&self) -> f64 {
        self.max_duration
    }

    /// Unfiltered pair count, `n * (n - 1) / 2`.
    pub fn pair_count(&self) -> usize {
        pair_count(self.members.len())
    }
}

/// Number of unordered pairs among `n` items.
pub const fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Group records into duration clusters.
///
/// Records are sorted ascending by duration (stable, so ties keep input
/// order) and greedily appended to the current cluster while they stay
/// within `tolerance` seconds of its running minimum and maximum. When a
/// record does not fit, the current cluster is emitted if it has at least
/// two members and a new one starts. Singletons are dropped: they cannot
/// contain a duplicate.
pub fn cluster_by_duration(records: &[Arc<FingerprintRecord>], tolerance: f64) -> Vec<Cluster> {
    let mut sorted: Vec<Arc<FingerprintRecord>> = records.to_vec();
    sorted.sort_by(|a, b| a.duration.total_cmp(&b.duration));

    let mut clusters = Vec::new();
    let mut current: Option<Cluster> = None;

    for record in sorted {
        match current.as_mut() {
            Some(cluster) if cluster.accepts(record.duration, tolerance) => cluster.push(record),
            _ => {
                if let Some(done) = current.replace(Cluster::start(record))
                    && done.len() >= 2
                {
                    clusters.push(done);
                }
            }
        }
    }
    if let Some(done) = current
        && done.len() >= 2
    {
        clusters.push(done);
    }

    let clustered: usize = clusters.iter().map(Cluster::len).sum();
    info!(
        "Created {} duration cluster(s) (tolerance: {}s), {} of {} record(s) clustered",
        clusters.len(),
        tolerance,
        clustered,
        records.len()
    );

    clusters
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn rec(id: &str, duration: f64) -> Arc<FingerprintRecord> {
        Arc::new(FingerprintRecord {
            entity_id: id.to_string(),
            variant_key: format!("{id}.mp3"),
            duration,
            fingerprint: "1".to_string(),
            source: "s".to_string(),
            format: "mp3".to_string(),
        })
    }

    fn ids(cluster: &Cluster) -> Vec<&str> {
        cluster
            .members()
            .iter()
            .map(|r| r.entity_id.as_str())
            .collect()
    }

    #[test]
    fn test_drops_singletons() {
        let records = vec![rec("A", 30.0), rec("B", 31.0), rec("C", 50.0), rec("D", 100.0)];
        let clusters = cluster_by_duration(&records, 2.0);
        assert_eq!(clusters.len(), 1);
        assert_eq!(ids(&clusters[0]), vec!["A", "B"]);
    }

    #[test]
    fn test_sorts_unsorted_input() {
        let records = vec![rec("B", 31.0), rec("X", 90.0), rec("A", 30.0), rec("Y", 91.0)];
        let clusters = cluster_by_duration(&records, 2.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(ids(&clusters[0]), vec!["A", "B"]);
        assert_eq!(ids(&clusters[1]), vec!["X", "Y"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let records = vec![rec("first", 10.0), rec("second", 10.0), rec("third", 10.0)];
        let clusters = cluster_by_duration(&records, 0.5);
        assert_eq!(ids(&clusters[0]), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let records = vec![rec("A", 10.0), rec("B", 12.0)];
        assert_eq!(cluster_by_duration(&records, 2.0).len(), 1);
    }

    #[test]
    fn test_window_is_measured_from_running_min() {
        // 10 -> 11 -> 12.5: 12.5 is within 2.0 of the max (11) but 2.5 from
        // the min (10), so it starts a new cluster.
        let records = vec![rec("A", 10.0), rec("B", 11.0), rec("C", 12.5), rec("D", 13.0)];
        let clusters = cluster_by_duration(&records, 2.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(ids(&clusters[0]), vec!["A", "B"]);
        assert_eq!(ids(&clusters[1]), vec!["C", "D"]);
        assert_eq!(clusters[1].min_duration(), 12.5);
        assert_eq!(clusters[1].max_duration(), 13.0);
    }

    #[test]
    fn test_empty_and_single_input() {
        assert!(cluster_by_duration(&[], 5.0).is_empty());
        assert!(cluster_by_duration(&[rec("A", 1.0)], 5.0).is_empty());
    }

    #[test]
    fn test_pair_count() {
        assert_eq!(pair_count(0), 0);
        assert_eq!(pair_count(1), 0);
        assert_eq!(pair_count(2), 1);
        assert_eq!(pair_count(5), 10);
    }
}
