//! Sharded output and the parallel pipeline coordinator
//!
//! [`Coordinator`] wires the other crates together: it enumerates inputs,
//! fans files out to a bounded worker pool, runs every record through the
//! validator chain and the sampler, and writes survivors to a
//! [`ShardedSink`].

pub mod coordinator;
pub mod sink;

pub use coordinator::Coordinator;
pub use sink::{shard_paths, ShardedSink};
pub use tokio_util::sync::CancellationToken;

// Re-export core types
pub use corpus_core::pipeline::{FileFailure, PipelineState, RunReport};
pub use corpus_core::{PipelineConfig, RecordSink, RunCounters};
