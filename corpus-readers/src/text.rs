//! Line-oriented record reading
//!
//! [`LineReader`] turns a file into a lazy sequence of records, one per
//! line. Bytes that are not valid UTF-8 are replaced rather than failing the
//! line, and a line that does not parse as a JSON object is reported as a
//! malformed rejection without ending the sequence.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use corpus_core::{Record, RecordSource, RejectReason, Rejection, ValidationOutcome};
use serde_json::Value;

use crate::error::Result;

/// Stage name recorded on rejections produced while decoding input
pub const READER_STAGE: &str = "reader";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Options for line reading
#[derive(Debug, Clone)]
pub struct LineReaderOptions {
    /// Parse every line as a JSON object
    pub structured: bool,

    /// Whether to skip lines that are empty or whitespace only
    pub skip_empty_lines: bool,

    /// Whether to strip a BOM (byte order mark) from the first line
    pub strip_bom: bool,

    /// Lines longer than this many bytes are rejected as malformed
    pub max_line_length: Option<usize>,

    /// Size of the read buffer
    pub buffer_size: usize,
}

impl Default for LineReaderOptions {
    fn default() -> Self {
        Self {
            structured: true,
            skip_empty_lines: true,
            strip_bom: true,
            max_line_length: None,
            buffer_size: 64 * 1024, // 64KB
        }
    }
}

impl LineReaderOptions {
    /// Options for raw text lines
    pub fn text() -> Self {
        Self {
            structured: false,
            ..Self::default()
        }
    }
}

/// A lazy, finite sequence of records read line by line
pub struct LineReader<R> {
    /// File the lines come from
    origin: Arc<Path>,

    /// Underlying reader
    reader: R,

    /// Reader options
    options: LineReaderOptions,

    /// Current line number
    current_line: usize,

    /// Raw bytes of the line being decoded
    buffer: Vec<u8>,

    /// Whether the reader is exhausted
    exhausted: bool,
}

impl LineReader<BufReader<File>> {
    /// Open a file for line reading
    pub fn open<P: AsRef<Path>>(path: P, options: LineReaderOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::with_capacity(options.buffer_size, file);
        Ok(Self::new(reader, path, options))
    }
}

impl<R: BufRead> LineReader<R> {
    /// Read lines from any buffered reader, labelling records with `origin`
    pub fn new<P: AsRef<Path>>(reader: R, origin: P, options: LineReaderOptions) -> Self {
        Self {
            origin: Arc::from(origin.as_ref()),
            reader,
            options,
            current_line: 0,
            buffer: Vec::new(),
            exhausted: false,
        }
    }

    /// Decode the line currently held in the buffer
    fn decode_buffer(&self) -> Option<ValidationOutcome> {
        let mut bytes = self.buffer.as_slice();

        while let Some((b'\n' | b'\r', rest)) = bytes.split_last() {
            bytes = rest;
        }

        if self.options.strip_bom && self.current_line == 1 {
            bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        }

        if self.options.max_line_length.is_some_and(|max| bytes.len() > max) {
            return Some(malformed());
        }

        let line = String::from_utf8_lossy(bytes);

        if self.options.skip_empty_lines && line.trim().is_empty() {
            return None;
        }

        if !self.options.structured {
            let record = Record::text(line.into_owned());
            return Some(ValidationOutcome::Accepted(
                record.with_origin(self.origin.clone(), self.current_line),
            ));
        }

        let outcome = serde_json::from_str::<Value>(&line)
            .ok()
            .and_then(Record::from_value)
            .map_or_else(malformed, |record| {
                let origin = self.origin.clone();
                ValidationOutcome::Accepted(record.with_origin(origin, self.current_line))
            });
        Some(outcome)
    }
}

fn malformed() -> ValidationOutcome {
    ValidationOutcome::Rejected(Rejection::new(RejectReason::Malformed, READER_STAGE))
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = corpus_core::Result<ValidationOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            self.buffer.clear();

            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => {
                    self.exhausted = true;
                }
                Ok(_) => {
                    self.current_line += 1;
                    if let Some(outcome) = self.decode_buffer() {
                        return Some(Ok(outcome));
                    }
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err.into()));
                }
            }
        }

        None
    }
}

impl<R: BufRead + Send> RecordSource for LineReader<R> {
    fn origin(&self) -> &Path {
        &self.origin
    }

    fn lines_read(&self) -> usize {
        self.current_line
    }
}
