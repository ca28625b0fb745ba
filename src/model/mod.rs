//! Core data model shared by the clustering, scheduling and output stages.

mod pair;
mod record;
mod results;

pub use pair::{ComparisonPair, PairKey, RecordId};
pub use record::FingerprintRecord;
pub use results::{DuplicateType, ErrorRecord, ErrorType, MatchRecord};
