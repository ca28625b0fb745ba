//! Configuration type definitions.

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_DURATION_TOLERANCE, DEFAULT_SIMILARITY_THRESHOLD, classification,
    comparator,
};
use serde::{Deserialize, Serialize};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan defaults.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Classification thresholds.
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// Built-in comparator settings.
    #[serde(default)]
    pub comparator: ComparatorConfig,
}

/// Default scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Which source combinations are compared.
    pub mode: ScanMode,

    /// Minimum similarity for a pair to be recorded.
    pub similarity_threshold: f64,

    /// Duration clustering tolerance in seconds.
    pub duration_tolerance: f64,

    /// Comparison worker processes (0 = derive from available cores).
    pub workers: usize,

    /// Records buffered per sink before flushing.
    pub batch_size: usize,

    /// Resume from an existing checkpoint.
    pub resume: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            duration_tolerance: DEFAULT_DURATION_TOLERANCE,
            workers: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            resume: true,
        }
    }
}

/// Similarity thresholds for duplicate classification.
///
/// These are product heuristics, kept configurable rather than baked into
/// the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Identical-content threshold.
    pub identical: f64,
    /// High-similarity threshold.
    pub high_similarity: f64,
    /// Related-versions threshold.
    pub related: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            identical: classification::IDENTICAL,
            high_similarity: classification::HIGH_SIMILARITY,
            related: classification::RELATED,
        }
    }
}

/// Settings for the built-in raw fingerprint comparator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Maximum alignment offset in frames, searched in both directions.
    pub max_offset: usize,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            max_offset: comparator::DEFAULT_MAX_OFFSET,
        }
    }
}

/// Which pairs within a cluster are compared.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Only pairs from different sources.
    #[default]
    CrossSource,
    /// Only pairs from the same source.
    SameSource,
    /// Every pair.
    All,
}

impl ScanMode {
    /// Whether a pair with the given source relation passes this mode.
    pub const fn accepts(self, same_source: bool) -> bool {
        match self {
            Self::CrossSource => !same_source,
            Self::SameSource => same_source,
            Self::All => true,
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CrossSource => write!(f, "cross-source"),
            Self::SameSource => write!(f, "same-source"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cross-source" | "cross_source" | "cross" => Ok(Self::CrossSource),
            "same-source" | "same_source" | "same" => Ok(Self::SameSource),
            "all" => Ok(Self::All),
            other => Err(format!("unknown scan mode: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mode_from_str() {
        assert_eq!(
            "cross-source".parse::<ScanMode>().ok(),
            Some(ScanMode::CrossSource)
        );
        assert_eq!(
            "same_source".parse::<ScanMode>().ok(),
            Some(ScanMode::SameSource)
        );
        assert_eq!("ALL".parse::<ScanMode>().ok(), Some(ScanMode::All));
        assert!("sideways".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_scan_mode_display_round_trips() {
        for mode in [ScanMode::CrossSource, ScanMode::SameSource, ScanMode::All] {
            assert_eq!(mode.to_string().parse::<ScanMode>().ok(), Some(mode));
        }
    }

    #[test]
    fn test_scan_mode_accepts() {
        assert!(ScanMode::CrossSource.accepts(false));
        assert!(!ScanMode::CrossSource.accepts(true));
        assert!(ScanMode::SameSource.accepts(true));
        assert!(!ScanMode::SameSource.accepts(false));
        assert!(ScanMode::All.accepts(true) && ScanMode::All.accepts(false));
    }

    #[test]
    fn test_scan_config_default_values() {
        let scan = ScanConfig::default();
        assert_eq!(scan.similarity_threshold, 0.80);
        assert_eq!(scan.duration_tolerance, 5.0);
        assert_eq!(scan.batch_size, 500);
        assert_eq!(scan.workers, 0);
        assert!(scan.resume);
    }

    #[test]
    fn test_classification_default_values() {
        let c = ClassificationConfig::default();
        assert_eq!(c.identical, 0.95);
        assert_eq!(c.high_similarity, 0.80);
        assert_eq!(c.related, 0.60);
    }
}
