use super::MatchStore;
use crate::error::Result;
use crate::model::{ComparisonPair, PairKey};
use std::collections::HashSet;
use tracing::info;

/// Filters out pairs already resolved by an earlier run.
///
/// Known keys are loaded once up front; the store is consulted only when the
/// cache misses.
pub struct DeduplicationGuard {
    cache: HashSet<PairKey>,
    store: Box<dyn MatchStore>,
}

impl DeduplicationGuard {
    /// Warm the cache from `store`.
    pub fn preload(store: Box<dyn MatchStore>) -> Result<Self> {
        let cache = store.load_keys()?;
        if !cache.is_empty() {
            info!("{} pair(s) already resolved, they will be skipped", cache.len());
        }
        Ok(Self { cache, store })
    }

    /// Whether the pair was already resolved, in either orientation.
    pub fn exists(&self, pair: &ComparisonPair) -> Result<bool> {
        let key = pair.key();
        if self.cache.contains(&key) {
            return Ok(true);
        }
        self.store.contains(&key)
    }

    /// Record a pair resolved during this run.
    pub fn remember(&mut self, key: PairKey) {
        self.cache.insert(key);
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{FingerprintRecord, RecordId};
    use crate::store::EmptyStore;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pair(a: &str, b: &str) -> ComparisonPair {
        let rec = |id: &str| {
            Arc::new(FingerprintRecord {
                entity_id: id.to_string(),
                variant_key: format!("{id}.mp3"),
                duration: 3.0,
                fingerprint: "1".to_string(),
                source: "s".to_string(),
                format: "mp3".to_string(),
            })
        };
        ComparisonPair::new(rec(a), rec(b))
    }

    struct CountingStore {
        known: HashSet<PairKey>,
        lookups: Arc<AtomicUsize>,
    }

    impl MatchStore for CountingStore {
        fn load_keys(&self) -> Result<HashSet<PairKey>> {
            Ok(HashSet::new())
        }

        fn contains(&self, key: &PairKey) -> Result<bool> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.known.contains(key))
        }
    }

    #[test]
    fn test_remembered_pair_exists_in_both_orientations() {
        let mut guard = DeduplicationGuard::preload(Box::new(EmptyStore)).unwrap();
        assert!(!guard.exists(&pair("a", "b")).unwrap());

        guard.remember(pair("a", "b").key());
        assert!(guard.exists(&pair("a", "b")).unwrap());
        assert!(guard.exists(&pair("b", "a")).unwrap());
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_store_consulted_only_on_cache_miss() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let known = HashSet::from([PairKey::new(
            RecordId::new("x", "x.mp3"),
            RecordId::new("y", "y.mp3"),
        )]);
        let mut guard = DeduplicationGuard::preload(Box::new(CountingStore {
            known,
            lookups: Arc::clone(&lookups),
        }))
        .unwrap();

        assert!(guard.exists(&pair("y", "x")).unwrap());
        assert_eq!(lookups.load(Ordering::SeqCst), 1);

        guard.remember(pair("a", "b").key());
        assert!(guard.exists(&pair("a", "b")).unwrap());
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }
}
