//! Summary statistics over a match file.

use crate::constants::classification;
use crate::error::Result;
use crate::model::{DuplicateType, MatchRecord};
use crate::output::read_json_lines;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Similarity buckets, highest first.
const BUCKETS: [(&str, f64); 5] = [
    ("0.95+", classification::IDENTICAL),
    ("0.90-0.95", 0.90),
    ("0.80-0.90", classification::HIGH_SIMILARITY),
    ("0.60-0.80", classification::RELATED),
    ("<0.60", f64::NEG_INFINITY),
];

/// Aggregate counts for a set of matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Total matched pairs.
    pub total: usize,
    /// Pairs spanning two catalogs.
    pub cross_source: usize,
    /// Pairs within one entity.
    pub same_entity: usize,
    /// Counts per classification.
    pub by_type: BTreeMap<DuplicateType, usize>,
    /// Counts per similarity bucket, highest bucket first.
    pub by_bucket: [usize; 5],
    /// Lines that could not be parsed.
    pub invalid_lines: usize,
}

impl MatchStats {
    /// Tally a slice of matches.
    pub fn from_records(records: &[MatchRecord]) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            if record.is_cross_source() {
                stats.cross_source += 1;
            }
            if record.is_same_entity {
                stats.same_entity += 1;
            }
            *stats.by_type.entry(record.duplicate_type).or_default() += 1;
            let bucket = BUCKETS
                .iter()
                .position(|(_, floor)| record.similarity >= *floor)
                .unwrap_or(BUCKETS.len() - 1);
            stats.by_bucket[bucket] += 1;
        }
        stats
    }

    /// Read and tally a match JSON Lines file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let read = read_json_lines::<MatchRecord>(path)?;
        let mut stats = Self::from_records(&read.records);
        stats.invalid_lines = read.invalid_lines;
        Ok(stats)
    }

    /// Pairs between different entities.
    pub const fn different_entity(&self) -> usize {
        self.total - self.same_entity
    }

    /// Classification counts, most frequent first.
    pub fn types_by_count(&self) -> Vec<(DuplicateType, usize)> {
        let mut types: Vec<_> = self.by_type.iter().map(|(t, n)| (*t, *n)).collect();
        types.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        types
    }
}

impl fmt::Display for MatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total pairs:       {}", self.total)?;
        writeln!(f, "Cross-source:      {}", self.cross_source)?;
        writeln!(f, "Same entity:       {}", self.same_entity)?;
        writeln!(f, "Different entity:  {}", self.different_entity())?;
        writeln!(f)?;
        writeln!(f, "By duplicate type:")?;
        for (kind, count) in self.types_by_count() {
            writeln!(f, "  {kind:<30} {count}")?;
        }
        writeln!(f)?;
        writeln!(f, "By similarity:")?;
        for ((label, _), count) in BUCKETS.iter().zip(self.by_bucket) {
            writeln!(f, "  {label:<10} {count}")?;
        }
        if self.invalid_lines > 0 {
            writeln!(f)?;
            writeln!(f, "Skipped {} invalid line(s)", self.invalid_lines)?;
        }
        Ok(())
    }
}
