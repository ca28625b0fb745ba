//! Error file analysis.

use crate::error::{Error, Result};
use crate::model::{ErrorRecord, ErrorType};
use crate::output::read_json_lines;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Breakdown of an error file.
#[derive(Debug, Clone, Default)]
pub struct ErrorAnalysis {
    /// Parsed error records, in file order.
    pub errors: Vec<ErrorRecord>,
    /// Counts per error type.
    pub by_type: BTreeMap<ErrorType, usize>,
    /// Counts per `source1 <-> source2` label.
    pub by_source_pair: BTreeMap<String, usize>,
    /// Lines skipped as invalid.
    pub invalid_lines: usize,
}

impl ErrorAnalysis {
    /// Tally a set of error records.
    pub fn from_records(errors: Vec<ErrorRecord>) -> Self {
        let mut by_type = BTreeMap::new();
        let mut by_source_pair = BTreeMap::new();
        for error in &errors {
            *by_type.entry(error.error_type).or_default() += 1;
            *by_source_pair.entry(error.source_pair()).or_default() += 1;
        }
        Self {
            errors,
            by_type,
            by_source_pair,
            invalid_lines: 0,
        }
    }

    /// Read and tally an error JSON Lines file. The file must exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::RecordFileRead {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        info!("Analyzing error file: {}", path.display());
        let read = read_json_lines::<ErrorRecord>(path)?;
        let mut analysis = Self::from_records(read.records);
        analysis.invalid_lines = read.invalid_lines;
        Ok(analysis)
    }

    /// Number of error records.
    pub fn total(&self) -> usize {
        self.errors.len()
    }

    /// Records to retry, optionally restricted to one error type.
    pub fn select(&self, filter: Option<ErrorType>) -> Vec<&ErrorRecord> {
        let selected: Vec<_> = self
            .errors
            .iter()
            .filter(|e| filter.is_none_or(|t| e.error_type == t))
            .collect();
        if let Some(kind) = filter {
            info!(
                "Selected {} {kind} error(s) of {} total",
                selected.len(),
                self.total()
            );
        }
        selected
    }

    #[allow(clippy::cast_precision_loss)]
    fn percent(&self, count: usize) -> f64 {
        if self.errors.is_empty() {
            0.0
        } else {
            count as f64 / self.errors.len() as f64 * 100.0
        }
    }
}

fn by_count_desc<K: Clone + Ord>(map: &BTreeMap<K, usize>) -> Vec<(K, usize)> {
    let mut entries: Vec<_> = map.iter().map(|(k, n)| (k.clone(), *n)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

impl fmt::Display for ErrorAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total errors: {}", self.total())?;
        writeln!(f)?;
        writeln!(f, "By error type:")?;
        for (kind, count) in by_count_desc(&self.by_type) {
            writeln!(f, "  {kind}: {count} ({:.1}%)", self.percent(count))?;
        }
        writeln!(f)?;
        writeln!(f, "By source pair:")?;
        for (pair, count) in by_count_desc(&self.by_source_pair) {
            writeln!(f, "  {pair}: {count} ({:.1}%)", self.percent(count))?;
        }
        if self.invalid_lines > 0 {
            writeln!(f)?;
            writeln!(f, "Skipped {} invalid line(s)", self.invalid_lines)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ComparisonPair, FingerprintRecord};
    use std::sync::Arc;

    fn error(source_b: &str, kind: ErrorType) -> ErrorRecord {
        let rec = |id: &str, source: &str| {
            Arc::new(FingerprintRecord {
                entity_id: id.to_string(),
                variant_key: format!("{id}.mp3"),
                duration: 4.0,
                fingerprint: "1".to_string(),
                source: source.to_string(),
                format: "mp3".to_string(),
            })
        };
        ErrorRecord::new(
            &ComparisonPair::new(rec("1", "artlist"), rec("2", source_b)),
            kind,
            "failed",
        )
    }

    #[test]
    fn test_counts_by_type_and_source_pair() {
        let analysis = ErrorAnalysis::from_records(vec![
            error("motionarray", ErrorType::ComparisonFailed),
            error("motionarray", ErrorType::Exception),
            error("artlist", ErrorType::ComparisonFailed),
            error("motionarray", ErrorType::ComparisonFailed),
        ]);

        assert_eq!(analysis.total(), 4);
        assert_eq!(analysis.by_type[&ErrorType::ComparisonFailed], 3);
        assert_eq!(analysis.by_source_pair["artlist <-> motionarray"], 3);

        let text = analysis.to_string();
        assert!(text.contains("COMPARISON_FAILED: 3 (75.0%)"));
        assert!(text.contains("artlist <-> artlist: 1 (25.0%)"));
    }

    #[test]
    fn test_select_by_type() {
        let analysis = ErrorAnalysis::from_records(vec![
            error("b", ErrorType::ComparisonFailed),
            error("b", ErrorType::Exception),
        ]);
        assert_eq!(analysis.select(None).len(), 2);
        assert_eq!(analysis.select(Some(ErrorType::Exception)).len(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = ErrorAnalysis::from_file(&dir.path().join("none.jsonl"));
        assert!(matches!(result, Err(Error::RecordFileRead { .. })));
    }
}
