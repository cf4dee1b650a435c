//! Sink trait for record output

use crate::error::Result;
use crate::record::Record;

/// A destination for accepted records, split into one or more shards
///
/// `write` takes `&self` so a single sink can be shared by every worker;
/// implementations serialize writes per shard, never globally.
pub trait RecordSink: Send + Sync {
    /// Write one record to the shard selected by `shard_hint % shard_count()`
    fn write(&self, record: &Record, shard_hint: usize) -> Result<()>;

    /// Number of shards
    fn shard_count(&self) -> usize;

    /// Flush and close every shard. Closing twice is a no-op.
    fn close(&self) -> Result<()>;
}
