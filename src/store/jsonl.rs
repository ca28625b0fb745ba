use super::MatchStore;
use crate::error::Result;
use crate::model::{MatchRecord, PairKey};
use crate::output::read_json_lines;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Match store backed by one or more match JSON Lines files.
///
/// The files are the run's own output plus any earlier outputs passed as
/// known matches.
#[derive(Debug, Clone, Default)]
pub struct JsonlMatchStore {
    paths: Vec<PathBuf>,
}

impl JsonlMatchStore {
    /// Store over the given files. Missing files are treated as empty.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Files backing the store.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl MatchStore for JsonlMatchStore {
    fn load_keys(&self) -> Result<HashSet<PairKey>> {
        let mut keys = HashSet::new();
        for path in &self.paths {
            let read = read_json_lines::<MatchRecord>(path)?;
            debug!(
                "Loaded {} known match(es) from {}",
                read.records.len(),
                path.display()
            );
            keys.extend(read.records.iter().map(MatchRecord::key));
        }
        Ok(keys)
    }

    fn contains(&self, _key: &PairKey) -> Result<bool> {
        // `load_keys` reads the files completely, so the warmed cache is
        // already authoritative.
        Ok(false)
    }
}
