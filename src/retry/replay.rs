//! Rebuild comparison pairs from error records.

use crate::model::{ComparisonPair, ErrorRecord, FingerprintRecord, PairKey, RecordId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Pairs ready to replay.
#[derive(Debug, Default)]
pub struct ReplayPlan {
    /// One pair per distinct failed pair.
    pub pairs: Vec<ComparisonPair>,
    /// Error records whose records are no longer in the feed.
    pub missing: usize,
    /// Error records repeating a pair already planned.
    pub repeated: usize,
}

/// Re-join error records with the feed to recover fingerprints.
///
/// Error records carry metadata only, so each side is looked up by
/// `(entity, variant)`. The same pair failing in several runs is replayed
/// once.
pub fn build_replay_pairs<'a>(
    errors: impl IntoIterator<Item = &'a ErrorRecord>,
    index: &HashMap<RecordId, Arc<FingerprintRecord>>,
) -> ReplayPlan {
    let mut plan = ReplayPlan::default();
    let mut planned: HashSet<PairKey> = HashSet::new();

    for error in errors {
        let first = error.first_id();
        let second = error.second_id();
        let (Some(a), Some(b)) = (index.get(&first), index.get(&second)) else {
            warn!("Cannot retry {first} <-> {second}: record not in input feed");
            plan.missing += 1;
            continue;
        };
        if !planned.insert(PairKey::new(first, second)) {
            plan.repeated += 1;
            continue;
        }
        plan.pairs
            .push(ComparisonPair::new(Arc::clone(a), Arc::clone(b)));
    }

    plan
}
