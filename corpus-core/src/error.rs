//! Error types for the corpus pipeline

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for corpus pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for corpus pipeline operations
///
/// Only run-level failures live here. Per-record problems (malformed lines,
/// schema or content-quality failures) are values of
/// [`crate::record::ValidationOutcome`] and never surface as `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An input root does not exist
    #[error("Input path not found: {}", path.display())]
    PathNotFound {
        /// The missing root
        path: PathBuf,
    },

    /// Writing to an output shard failed
    #[error("Write to shard {shard} ({}) failed: {source}", path.display())]
    SinkWrite {
        /// Index of the failing shard
        shard: usize,
        /// Destination of the failing shard
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: io::Error,
    },

    /// A shard was written to after it was closed
    #[error("Shard {0} is closed")]
    ShardClosed(usize),

    /// Configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Pipeline execution error
    #[error("Pipeline execution error: {0}")]
    PipelineExecution(String),
}

impl Error {
    /// Whether this error aborts the whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::PathNotFound { .. }
                | Error::SinkWrite { .. }
                | Error::ShardClosed(_)
                | Error::InvalidConfig(_)
                | Error::PipelineExecution(_)
        )
    }
}
