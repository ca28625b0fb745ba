//! Persistent match store and the deduplication guard in front of it.

mod guard;
mod jsonl;

pub use guard::DeduplicationGuard;
pub use jsonl::JsonlMatchStore;

use crate::error::Result;
use crate::model::PairKey;
use std::collections::HashSet;

/// Existence checks against previously persisted matches.
///
/// Keys are unordered: `(a, b)` and `(b, a)` are the same pair.
pub trait MatchStore: Send {
    /// Every pair key currently in the store, used to warm the guard's cache.
    fn load_keys(&self) -> Result<HashSet<PairKey>>;

    /// Authoritative check for a single pair.
    fn contains(&self, key: &PairKey) -> Result<bool>;
}

/// Store with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyStore;

impl MatchStore for EmptyStore {
    fn load_keys(&self) -> Result<HashSet<PairKey>> {
        Ok(HashSet::new())
    }

    fn contains(&self, _key: &PairKey) -> Result<bool> {
        Ok(false)
    }
}
