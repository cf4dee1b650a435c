//! Source traits for record input

use std::path::Path;

use crate::error::Result;
use crate::record::ValidationOutcome;

/// A finite, lazy sequence of records read from one file
///
/// Each item is either a decoded record (`Accepted`), a line that could not
/// be decoded (`Rejected` with [`crate::RejectReason::Malformed`]), or an
/// `Err` when the underlying file can no longer be read. A malformed line
/// never ends the sequence; an `Err` does.
pub trait RecordSource: Iterator<Item = Result<ValidationOutcome>> + Send {
    /// The file being read
    fn origin(&self) -> &Path;

    /// Number of lines (or array elements) consumed so far
    fn lines_read(&self) -> usize;
}

/// A factory that opens a [`RecordSource`] for a discovered file
pub trait SourceFactory: Send + Sync {
    /// Open the file at `path`
    fn open(&self, path: &Path) -> Result<Box<dyn RecordSource>>;
}
