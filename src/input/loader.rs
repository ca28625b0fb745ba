//! JSON Lines fingerprint feed reader.

use crate::error::{Error, Result};
use crate::model::{FingerprintRecord, RecordId};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Records accepted from the feed, plus bookkeeping for the summary.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    /// Usable records, sorted ascending by duration.
    pub records: Vec<Arc<FingerprintRecord>>,
    /// Lines rejected for missing or invalid fields.
    pub rejected: usize,
}

/// Load fingerprint records from a JSON Lines file.
///
/// Blank lines are ignored. Records with a non-positive duration or an
/// empty fingerprint are skipped with a warning. A line that is not valid
/// JSON is fatal. When `limit` is set only the `limit` shortest records are
/// kept.
pub fn load_records(path: &Path, limit: Option<usize>) -> Result<LoadedRecords> {
    let file = File::open(path).map_err(|e| Error::InputRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = BufReader::new(file);

    let mut loaded = LoadedRecords::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::InputRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: FingerprintRecord =
            serde_json::from_str(trimmed).map_err(|e| Error::InputParse {
                path: path.to_path_buf(),
                line: idx + 1,
                source: e,
            })?;

        if let Some(reason) = record.rejection_reason() {
            warn!(
                "Skipping record {} at line {}: {}",
                record.id(),
                idx + 1,
                reason
            );
            loaded.rejected += 1;
            continue;
        }

        loaded.records.push(Arc::new(record));
    }

    // Stable: equal durations keep feed order.
    loaded
        .records
        .sort_by(|a, b| a.duration.total_cmp(&b.duration));

    if let Some(limit) = limit
        && loaded.records.len() > limit
    {
        debug!(
            "Truncating {} records to the {} shortest",
            loaded.records.len(),
            limit
        );
        loaded.records.truncate(limit);
    }

    info!(
        "Loaded {} fingerprint record(s) from {} ({} rejected)",
        loaded.records.len(),
        path.display(),
        loaded.rejected
    );

    Ok(loaded)
}

/// Index records by identity.
///
/// Later duplicates of the same `(entity, variant)` replace earlier ones.
pub fn index_by_id(records: &[Arc<FingerprintRecord>]) -> HashMap<RecordId, Arc<FingerprintRecord>> {
    records.iter().map(|r| (r.id(), Arc::clone(r))).collect()
}
