//! Factory for opening record sources by input format

use std::path::Path;

use corpus_core::{InputFormat, RecordSource, SourceFactory};

use crate::error::Result;
use crate::json::JsonArrayReader;
use crate::text::{LineReader, LineReaderOptions};

/// Resolve [`InputFormat::Auto`] from a file's extension
pub fn detect_format(path: &Path, format: InputFormat) -> InputFormat {
    if format != InputFormat::Auto {
        return format;
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("json") => InputFormat::JsonArray,
        Some("txt" | "text") => InputFormat::Text,
        _ => InputFormat::JsonLines,
    }
}

/// Open a single file as a record source
pub fn open_source(path: &Path, format: InputFormat) -> Result<Box<dyn RecordSource>> {
    ReaderFactory::new(format).open_source(path)
}

/// Opens discovered files with the reader matching the configured format
#[derive(Debug, Clone)]
pub struct ReaderFactory {
    /// Configured input format
    format: InputFormat,

    /// Options shared by line readers
    line_options: LineReaderOptions,
}

impl ReaderFactory {
    /// Create a factory for `format`
    pub fn new(format: InputFormat) -> Self {
        Self {
            format,
            line_options: LineReaderOptions::default(),
        }
    }

    /// Override the options used by line readers
    #[must_use]
    pub fn with_line_options(mut self, options: LineReaderOptions) -> Self {
        self.line_options = options;
        self
    }

    /// Open `path` with the reader for its resolved format
    pub fn open_source(&self, path: &Path) -> Result<Box<dyn RecordSource>> {
        let source: Box<dyn RecordSource> = match detect_format(path, self.format) {
            InputFormat::JsonArray => Box::new(JsonArrayReader::open(path)?),
            InputFormat::Text => Box::new(LineReader::open(
                path,
                LineReaderOptions {
                    structured: false,
                    ..self.line_options.clone()
                },
            )?),
            InputFormat::JsonLines | InputFormat::Auto => Box::new(LineReader::open(
                path,
                LineReaderOptions {
                    structured: true,
                    ..self.line_options.clone()
                },
            )?),
        };
        Ok(source)
    }
}

impl SourceFactory for ReaderFactory {
    fn open(&self, path: &Path) -> corpus_core::Result<Box<dyn RecordSource>> {
        Ok(self.open_source(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("a.json", InputFormat::JsonArray)]
    #[test_case("a.JSON", InputFormat::JsonArray)]
    #[test_case("a.txt", InputFormat::Text)]
    #[test_case("a.jsonl", InputFormat::JsonLines)]
    #[test_case("no_extension", InputFormat::JsonLines)]
    fn test_auto_detection(name: &str, expected: InputFormat) {
        assert_eq!(detect_format(Path::new(name), InputFormat::Auto), expected);
    }

    #[test]
    fn test_explicit_format_wins() {
        assert_eq!(
            detect_format(Path::new("a.json"), InputFormat::JsonLines),
            InputFormat::JsonLines
        );
    }

    #[test]
    fn test_open_by_format() {
        let dir = TempDir::new().unwrap();
        let lines = dir.path().join("a.txt");
        fs::write(&lines, "{\"x\":1}\n{\"x\":2}\n").unwrap();

        let as_json: Vec<_> = open_source(&lines, InputFormat::JsonLines)
            .unwrap()
            .map(|o| o.unwrap())
            .collect();
        assert!(as_json.iter().all(|o| o.clone().accepted().unwrap().is_structured()));

        let as_text: Vec<_> = open_source(&lines, InputFormat::Auto)
            .unwrap()
            .map(|o| o.unwrap())
            .collect();
        assert!(as_text.iter().all(|o| !o.clone().accepted().unwrap().is_structured()));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let factory = ReaderFactory::new(InputFormat::JsonLines);
        assert!(factory.open(&dir.path().join("absent.jsonl")).is_err());
    }
}
