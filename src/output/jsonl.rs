//! JSON Lines writer and reader.

use crate::error::{Error, Result};
use crate::output::RecordWriter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Appends one JSON object per line, opening the file on first write.
///
/// Every batch is synced to disk before `append` returns, so a completed
/// flush survives a crash.
pub struct JsonLinesWriter<T> {
    path: PathBuf,
    file: Option<File>,
    _record: PhantomData<fn(&T)>,
}

impl<T> JsonLinesWriter<T> {
    /// Writer for `path`. Nothing is created until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            _record: PhantomData,
        }
    }

    fn file(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        self.file.as_mut().ok_or_else(|| Error::Internal {
            message: "output file handle missing".to_string(),
        })
    }
}

impl<T: Serialize> RecordWriter<T> for JsonLinesWriter<T> {
    fn append(&mut self, records: &[T]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Serialize the whole batch first so a bad record never leaves a
        // partial batch on disk.
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)
                .map_err(|source| Error::RecordSerialize { source })?;
            buffer.push(b'\n');
        }

        let file = self.file()?;
        append_or_rollback(file, |file| {
            let mut writer = BufWriter::new(file);
            writer.write_all(&buffer)?;
            writer.flush()
        })?;
        file.sync_data()?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Run `write` against `file`, cutting the file back to its previous length
/// if it fails, so a retried batch never starts mid-line.
fn append_or_rollback<F>(file: &File, write: F) -> Result<()>
where
    F: FnOnce(&File) -> std::io::Result<()>,
{
    let previous_len = file.metadata()?.len();
    if let Err(e) = write(file) {
        if let Err(truncate) = file.set_len(previous_len) {
            warn!("Could not roll back partial write to {previous_len} bytes: {truncate}");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Records read back from a JSON Lines file.
#[derive(Debug)]
pub struct ReadRecords<T> {
    /// Successfully parsed records, in file order.
    pub records: Vec<T>,
    /// Lines that were not valid records.
    pub invalid_lines: usize,
}

/// Read every record from a JSON Lines file.
///
/// Blank lines are skipped; unparseable lines are counted and logged but do
/// not fail the read. A missing file yields no records.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<ReadRecords<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ReadRecords {
                records: Vec::new(),
                invalid_lines: 0,
            });
        }
        Err(source) => {
            return Err(Error::RecordFileRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut records = Vec::new();
    let mut invalid_lines = 0;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| Error::RecordFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                invalid_lines += 1;
                warn!("{}:{}: skipping invalid line: {e}", path.display(), index + 1);
            }
        }
    }

    Ok(ReadRecords {
        records,
        invalid_lines,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        n: u32,
    }

    #[test]
    fn test_file_created_lazily_and_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.jsonl");
        let mut writer = JsonLinesWriter::<Row>::new(&path);

        writer.append(&[]).unwrap();
        assert!(!path.exists());

        writer.append(&[Row { n: 1 }, Row { n: 2 }]).unwrap();
        writer.append(&[Row { n: 3 }]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n");
    }

    #[test]
    fn test_existing_file_is_appended_not_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jsonl");
        std::fs::write(&path, "{\"n\":0}\n").unwrap();

        JsonLinesWriter::<Row>::new(&path)
            .append(&[Row { n: 1 }])
            .unwrap();

        let read: ReadRecords<Row> = read_json_lines(&path).unwrap();
        assert_eq!(read.records, vec![Row { n: 0 }, Row { n: 1 }]);
    }

    #[test]
    fn test_failed_append_leaves_no_partial_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.jsonl");
        std::fs::write(&path, "{\"n\":1}\n").unwrap();
        let file = OpenOptions::new().append(true).open(&path).unwrap();

        let result = append_or_rollback(&file, |mut f| {
            f.write_all(b"{\"n\":2")?;
            Err(std::io::Error::other("disk full"))
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"n\":1}\n");

        let mut writer = JsonLinesWriter::<Row>::new(&path);
        writer.append(&[Row { n: 2 }]).unwrap();
        let rows: Vec<Row> = read_json_lines(&path).unwrap().records;
        assert_eq!(rows, vec![Row { n: 1 }, Row { n: 2 }]);
    }

    #[test]
    fn test_read_skips_invalid_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.jsonl");
        std::fs::write(&path, "{\"n\":1}\n\nnot json\n{\"n\":2}\n{\"n\":").unwrap();

        let read: ReadRecords<Row> = read_json_lines(&path).unwrap();
        assert_eq!(read.records.len(), 2);
        assert_eq!(read.invalid_lines, 2);
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let read: ReadRecords<Row> = read_json_lines(&dir.path().join("absent.jsonl")).unwrap();
        assert!(read.records.is_empty());
        assert_eq!(read.invalid_lines, 0);
    }
}
