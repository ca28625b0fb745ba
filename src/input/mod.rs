//! Fingerprint input feed.

mod loader;

pub use loader::{LoadedRecords, index_by_id, load_records};
