//! File discovery, record readers and record writers for the corpus pipeline
//!
//! Readers turn files into lazy sequences of [`corpus_core::ValidationOutcome`]s
//! (JSON lines, raw text lines, or whole JSON array documents). Writers
//! serialize accepted records back out as JSON lines, JSON arrays, or bare
//! content.

mod error;
mod factory;

pub mod discovery;
pub mod json;
pub mod text;
pub mod writer;

pub use discovery::SourceEnumerator;
pub use error::{Error, Result};
pub use factory::{detect_format, open_source, ReaderFactory};
pub use json::JsonArrayReader;
pub use text::{LineReader, LineReaderOptions, READER_STAGE};
pub use writer::{create_record_writer, encode_record, RecordWriter};

// Re-export core types
pub use corpus_core::{
    InputFormat, OutputFormat, Record, RecordSource, SourceFactory, ValidationOutcome,
};
