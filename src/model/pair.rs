//! Candidate comparison pairs and their order-independent keys.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::FingerprintRecord;

/// Identity of one side of a pair: `(entity, variant)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    /// Entity (asset) identifier.
    pub entity_id: String,
    /// Variant (file) key.
    pub variant_key: String,
}

impl RecordId {
    /// Build an identifier from its parts.
    pub fn new(entity_id: &str, variant_key: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            variant_key: variant_key.to_string(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_id, self.variant_key)
    }
}

/// Unordered pair key: `(a, b)` and `(b, a)` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: RecordId,
    high: RecordId,
}

impl PairKey {
    /// Create a key from two record identities in any order.
    pub fn new(a: RecordId, b: RecordId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// The lexicographically smaller side.
    pub const fn low(&self) -> &RecordId {
        &self.low
    }

    /// The lexicographically larger side.
    pub const fn high(&self) -> &RecordId {
        &self.high
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.low, self.high)
    }
}

/// Two records selected for comparison.
///
/// Always built with differing variant keys; the generator never emits
/// self-pairs.
#[derive(Debug, Clone)]
pub struct ComparisonPair {
    /// First record (earlier in cluster order).
    pub a: Arc<FingerprintRecord>,
    /// Second record.
    pub b: Arc<FingerprintRecord>,
}

impl ComparisonPair {
    /// Pair two records.
    pub const fn new(a: Arc<FingerprintRecord>, b: Arc<FingerprintRecord>) -> Self {
        Self { a, b }
    }

    /// Order-independent key of this pair.
    pub fn key(&self) -> PairKey {
        PairKey::new(self.a.id(), self.b.id())
    }

    /// Absolute duration difference in seconds.
    pub fn duration_diff(&self) -> f64 {
        (self.a.duration - self.b.duration).abs()
    }

    /// Whether both records come from the same catalog.
    pub fn same_source(&self) -> bool {
        self.a.source == self.b.source
    }

    /// Whether both records share a format.
    pub fn same_format(&self) -> bool {
        self.a.format == self.b.format
    }

    /// Whether both records belong to the same entity.
    pub fn same_entity(&self) -> bool {
        self.a.entity_id == self.b.entity_id
    }
}
