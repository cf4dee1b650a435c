//! Error types for readers and writers

use std::path::PathBuf;

use thiserror::Error;

/// Error type for readers and writers
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] corpus_core::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON format error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An input root does not exist
    #[error("Input path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// Format error
    #[error("Format error in {}: {message}", path.display())]
    Format {
        /// File being decoded
        path: PathBuf,
        /// What was wrong
        message: String,
    },
}

/// Result type for readers and writers
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for corpus_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(inner) => inner,
            Error::Io(inner) => corpus_core::Error::Io(inner),
            Error::Json(inner) => corpus_core::Error::Json(inner),
            Error::PathNotFound(path) => corpus_core::Error::PathNotFound { path },
            Error::Format { path, message } => corpus_core::Error::InvalidArgument(format!(
                "{}: {message}",
                path.display()
            )),
        }
    }
}
