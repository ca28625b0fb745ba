//! Duplicate classification.

use crate::config::ClassificationConfig;
use crate::model::{ComparisonPair, DuplicateType};

/// Maps a similarity score and the pair's source/format relation to a
/// [`DuplicateType`].
///
/// | similarity          | same format & source | same source only | cross-source |
/// |---------------------|----------------------|------------------|--------------|
/// | >= identical        | `IDENTICAL` | `SAME_CONTENT_DIFF_FORMAT` | `CROSS_SOURCE_IDENTICAL` |
/// | >= high_similarity  | `HIGH_SIMILARITY_SAME_SOURCE` | `HIGH_SIMILARITY_SAME_SOURCE` | `HIGH_SIMILARITY_CROSS_SOURCE` |
/// | >= related          | `RELATED_VERSIONS` | `RELATED_VERSIONS` | `RELATED_VERSIONS` |
/// | otherwise           | `LOW_SIMILARITY` | `LOW_SIMILARITY` | `LOW_SIMILARITY` |
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    thresholds: ClassificationConfig,
}

impl Classifier {
    /// Create a classifier with the given thresholds.
    pub const fn new(thresholds: ClassificationConfig) -> Self {
        Self { thresholds }
    }

    /// Classify a compared pair.
    pub fn classify(&self, pair: &ComparisonPair, similarity: f64) -> DuplicateType {
        self.classify_relation(pair.same_source(), pair.same_format(), similarity)
    }

    /// Classify from the raw relation flags.
    pub fn classify_relation(
        &self,
        same_source: bool,
        same_format: bool,
        similarity: f64,
    ) -> DuplicateType {
        let t = &self.thresholds;
        if similarity >= t.identical {
            match (same_source, same_format) {
                (true, true) => DuplicateType::Identical,
                (true, false) => DuplicateType::SameContentDiffFormat,
                (false, _) => DuplicateType::CrossSourceIdentical,
            }
        } else if similarity >= t.high_similarity {
            if same_source {
                DuplicateType::HighSimilaritySameSource
            } else {
                DuplicateType::HighSimilarityCrossSource
            }
        } else if similarity >= t.related {
            DuplicateType::RelatedVersions
        } else {
            DuplicateType::LowSimilarity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(ClassificationConfig::default())
    }

    #[test]
    fn test_identical_band() {
        let c = classifier();
        assert_eq!(c.classify_relation(true, true, 0.97), DuplicateType::Identical);
        assert_eq!(
            c.classify_relation(true, false, 0.95),
            DuplicateType::SameContentDiffFormat
        );
        assert_eq!(
            c.classify_relation(false, true, 0.99),
            DuplicateType::CrossSourceIdentical
        );
        assert_eq!(
            c.classify_relation(false, false, 1.0),
            DuplicateType::CrossSourceIdentical
        );
    }

    #[test]
    fn test_high_similarity_band() {
        let c = classifier();
        assert_eq!(
            c.classify_relation(true, true, 0.82),
            DuplicateType::HighSimilaritySameSource
        );
        assert_eq!(
            c.classify_relation(true, false, 0.80),
            DuplicateType::HighSimilaritySameSource
        );
        assert_eq!(
            c.classify_relation(false, true, 0.82),
            DuplicateType::HighSimilarityCrossSource
        );
    }

    #[test]
    fn test_lower_bands_ignore_relation() {
        let c = classifier();
        for (s, f) in [(true, true), (true, false), (false, false)] {
            assert_eq!(c.classify_relation(s, f, 0.6), DuplicateType::RelatedVersions);
            assert_eq!(c.classify_relation(s, f, 0.59), DuplicateType::LowSimilarity);
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let c = Classifier::new(ClassificationConfig {
            identical: 0.99,
            high_similarity: 0.9,
            related: 0.7,
        });
        assert_eq!(
            c.classify_relation(true, true, 0.97),
            DuplicateType::HighSimilaritySameSource
        );
        assert_eq!(c.classify_relation(true, true, 0.65), DuplicateType::LowSimilarity);
    }
}
