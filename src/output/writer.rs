//! Output writer trait definition.

use crate::error::Result;
use std::path::Path;

/// Durable destination for a stream of records.
///
/// `append` must either persist the whole batch or return an error; a sink
/// relies on that to decide whether its buffer can be cleared.
pub trait RecordWriter<T>: Send {
    /// Append a batch of records.
    fn append(&mut self, records: &[T]) -> Result<()>;

    /// Where records end up.
    fn path(&self) -> &Path;
}
