//! CSV export of match files.

use crate::constants::UTF8_BOM;
use crate::error::{Error, Result};
use crate::model::MatchRecord;
use crate::output::read_json_lines;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Outcome of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    /// Rows written.
    pub rows: usize,
    /// Input lines skipped as invalid.
    pub skipped: usize,
}

/// Convert a match JSON Lines file to CSV.
///
/// Columns follow the match record fields. With `bom`, a UTF-8 byte order
/// mark is written first so spreadsheet applications detect the encoding.
pub fn export_matches_csv(input: &Path, output: &Path, bom: bool) -> Result<ExportSummary> {
    let read = read_json_lines::<MatchRecord>(input)?;

    let csv_error = |source| Error::CsvWrite {
        path: output.to_path_buf(),
        source,
    };

    let mut file = BufWriter::new(File::create(output)?);
    if bom {
        file.write_all(UTF8_BOM)?;
    }

    let mut writer = csv::Writer::from_writer(file);
    for record in &read.records {
        writer.serialize(record).map_err(csv_error)?;
    }
    writer.flush()?;

    Ok(ExportSummary {
        rows: read.records.len(),
        skipped: read.invalid_lines,
    })
}
