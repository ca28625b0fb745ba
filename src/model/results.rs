//! Match and error records written by the sinks.
//!
//! Both records are flat so that one JSON object maps to one output line
//! (and one row of a warehouse table) without nesting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ComparisonPair, PairKey, RecordId};

/// Classification of a matched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateType {
    /// Same content, same format, same source.
    Identical,
    /// Same content and source, different format.
    SameContentDiffFormat,
    /// Same content found in two catalogs.
    CrossSourceIdentical,
    /// Highly similar, same catalog.
    HighSimilaritySameSource,
    /// Highly similar, different catalogs.
    HighSimilarityCrossSource,
    /// Likely edits or alternate versions of one piece.
    RelatedVersions,
    /// Below every classification threshold.
    LowSimilarity,
}

impl DuplicateType {
    /// Wire name, as written to output files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identical => "IDENTICAL",
            Self::SameContentDiffFormat => "SAME_CONTENT_DIFF_FORMAT",
            Self::CrossSourceIdentical => "CROSS_SOURCE_IDENTICAL",
            Self::HighSimilaritySameSource => "HIGH_SIMILARITY_SAME_SOURCE",
            Self::HighSimilarityCrossSource => "HIGH_SIMILARITY_CROSS_SOURCE",
            Self::RelatedVersions => "RELATED_VERSIONS",
            Self::LowSimilarity => "LOW_SIMILARITY",
        }
    }
}

impl std::fmt::Display for DuplicateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Kind of per-pair failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// The comparator reported an error or returned a malformed score.
    ComparisonFailed,
    /// The worker crashed or broke protocol while handling the pair.
    Exception,
}

impl ErrorType {
    /// Wire name, as written to output files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ComparisonFailed => "COMPARISON_FAILED",
            Self::Exception => "EXCEPTION",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "COMPARISON_FAILED" => Ok(Self::ComparisonFailed),
            "EXCEPTION" => Ok(Self::Exception),
            other => Err(format!("unknown error type: {other}")),
        }
    }
}

/// A pair whose similarity reached the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Entity of the first record.
    #[serde(rename = "assetID1")]
    pub asset_id1: String,
    /// Entity of the second record.
    #[serde(rename = "assetID2")]
    pub asset_id2: String,
    /// Both records belong to the same entity.
    #[serde(rename = "isSameEntity")]
    pub is_same_entity: bool,
    /// Comparator score in `[0, 1]`.
    pub similarity: f64,
    /// Classification tag.
    #[serde(rename = "duplicateType")]
    pub duplicate_type: DuplicateType,
    /// Variant key of the first record.
    #[serde(rename = "fileKey1")]
    pub file_key1: String,
    /// Format of the first record.
    pub format1: String,
    /// Source of the first record.
    pub source1: String,
    /// Duration of the first record.
    pub duration1: f64,
    /// Variant key of the second record.
    #[serde(rename = "fileKey2")]
    pub file_key2: String,
    /// Format of the second record.
    pub format2: String,
    /// Source of the second record.
    pub source2: String,
    /// Duration of the second record.
    pub duration2: f64,
    /// Absolute duration difference in seconds.
    #[serde(rename = "durationDiff")]
    pub duration_diff: f64,
}

impl MatchRecord {
    /// Build a match from a compared pair.
    pub fn new(pair: &ComparisonPair, similarity: f64, duplicate_type: DuplicateType) -> Self {
        Self {
            asset_id1: pair.a.entity_id.clone(),
            asset_id2: pair.b.entity_id.clone(),
            is_same_entity: pair.same_entity(),
            similarity,
            duplicate_type,
            file_key1: pair.a.variant_key.clone(),
            format1: pair.a.format.clone(),
            source1: pair.a.source.clone(),
            duration1: pair.a.duration,
            file_key2: pair.b.variant_key.clone(),
            format2: pair.b.format.clone(),
            source2: pair.b.source.clone(),
            duration2: pair.b.duration,
            duration_diff: pair.duration_diff(),
        }
    }

    /// Order-independent key of the matched pair.
    pub fn key(&self) -> PairKey {
        PairKey::new(
            RecordId::new(&self.asset_id1, &self.file_key1),
            RecordId::new(&self.asset_id2, &self.file_key2),
        )
    }

    /// Whether the two records come from different catalogs.
    pub fn is_cross_source(&self) -> bool {
        self.source1 != self.source2
    }
}

/// A pair whose comparison failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Failure category.
    #[serde(rename = "errorType")]
    pub error_type: ErrorType,
    /// Human-readable failure description.
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
    /// Entity of the first record.
    #[serde(rename = "assetID1")]
    pub asset_id1: String,
    /// Variant key of the first record.
    #[serde(rename = "fileKey1")]
    pub file_key1: String,
    /// Format of the first record.
    pub format1: String,
    /// Source of the first record.
    pub source1: String,
    /// Duration of the first record.
    pub duration1: f64,
    /// Entity of the second record.
    #[serde(rename = "assetID2")]
    pub asset_id2: String,
    /// Variant key of the second record.
    #[serde(rename = "fileKey2")]
    pub file_key2: String,
    /// Format of the second record.
    pub format2: String,
    /// Source of the second record.
    pub source2: String,
    /// Duration of the second record.
    pub duration2: f64,
    /// Absolute duration difference in seconds.
    #[serde(rename = "durationDiff")]
    pub duration_diff: f64,
}

impl ErrorRecord {
    /// Build an error record for a failed pair, stamped now.
    pub fn new(pair: &ComparisonPair, error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            error_message: message.into(),
            timestamp: Utc::now(),
            asset_id1: pair.a.entity_id.clone(),
            file_key1: pair.a.variant_key.clone(),
            format1: pair.a.format.clone(),
            source1: pair.a.source.clone(),
            duration1: pair.a.duration,
            asset_id2: pair.b.entity_id.clone(),
            file_key2: pair.b.variant_key.clone(),
            format2: pair.b.format.clone(),
            source2: pair.b.source.clone(),
            duration2: pair.b.duration,
            duration_diff: pair.duration_diff(),
        }
    }

    /// Identity of the first record.
    pub fn first_id(&self) -> RecordId {
        RecordId::new(&self.asset_id1, &self.file_key1)
    }

    /// Identity of the second record.
    pub fn second_id(&self) -> RecordId {
        RecordId::new(&self.asset_id2, &self.file_key2)
    }

    /// `source1 <-> source2` label used in error analysis.
    pub fn source_pair(&self) -> String {
        format!("{} <-> {}", self.source1, self.source2)
    }
}
