//! Output writers: buffered sinks, JSON Lines files, CSV export, statistics
//! and progress display.

mod csv;
mod jsonl;
pub mod progress;
mod sink;
mod stats;
mod writer;

pub use csv::{ExportSummary, export_matches_csv};
pub use jsonl::{JsonLinesWriter, ReadRecords, read_json_lines};
pub use sink::{BufferedSink, ErrorSink, FlushPolicy, ResultSink};
pub use stats::MatchStats;
pub use writer::RecordWriter;
