//! Candidate pair generation within a cluster.

use super::Cluster;
use crate::config::ScanMode;
use crate::model::ComparisonPair;
use std::sync::Arc;

/// Enumerate the comparison pairs of a cluster.
///
/// Every `i < j` combination is visited once, so no unordered pair is
/// emitted twice. Pairs sharing a variant key (the same physical file) are
/// skipped, and the mode filter keeps cross-source, same-source or all
/// pairs.
pub fn generate_pairs(cluster: &Cluster, mode: ScanMode) -> Vec<ComparisonPair> {
    let members = cluster.members();
    let mut pairs = Vec::new();

    for (i, a) in members.iter().enumerate() {
        for b in &members[i + 1..] {
            if a.variant_key == b.variant_key {
                continue;
            }
            if !mode.accepts(a.source == b.source) {
                continue;
            }
            pairs.push(ComparisonPair::new(Arc::clone(a), Arc::clone(b)));
        }
    }

    pairs
}
