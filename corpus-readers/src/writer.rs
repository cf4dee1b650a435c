//! Record writer implementation

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use corpus_core::{OutputFormat, Record};

use crate::error::Result;

/// Serialize a record into the payload written for `format`
///
/// Encoding is separated from writing so callers can do it before taking
/// a lock on a shared writer. Text records stay verbatim in JSON lines
/// output and become JSON strings inside a JSON array.
pub fn encode_record(record: &Record, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::JsonLines => Ok(record.encode_line()?),
        OutputFormat::JsonArray => Ok(serde_json::to_string(&record.to_value())?),
        OutputFormat::Content => Ok(record.content().unwrap_or_default().to_string()),
    }
}

/// Writes encoded records to one destination
///
/// JSON lines and content output are one record per line. JSON array output
/// is a single array document with one element per line, closed by
/// [`RecordWriter::finish`].
pub struct RecordWriter<W: Write> {
    /// Inner writer
    writer: W,

    /// Output format
    format: OutputFormat,

    /// Records written so far
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    /// Create a new record writer
    pub fn new(mut writer: W, format: OutputFormat) -> Result<Self> {
        if format == OutputFormat::JsonArray {
            writer.write_all(b"[")?;
        }

        Ok(Self {
            writer,
            format,
            written: 0,
        })
    }

    /// Encode and write a single record
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let payload = encode_record(record, self.format)?;
        self.write_encoded(&payload)
    }

    /// Write a payload produced by [`encode_record`] as one unit
    pub fn write_encoded(&mut self, payload: &str) -> Result<()> {
        let mut unit = Vec::with_capacity(payload.len() + 2);

        if self.format == OutputFormat::JsonArray {
            unit.extend_from_slice(if self.written == 0 { b"\n" } else { b",\n" });
            unit.extend_from_slice(payload.as_bytes());
        } else {
            unit.extend_from_slice(payload.as_bytes());
            unit.push(b'\n');
        }

        self.writer.write_all(&unit)?;
        self.written += 1;
        Ok(())
    }

    /// Records written so far
    pub fn records_written(&self) -> u64 {
        self.written
    }

    /// Flush the writer
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Close the document, flush, and hand back the inner writer
    pub fn finish(mut self) -> Result<W> {
        if self.format == OutputFormat::JsonArray {
            let tail: &[u8] = if self.written == 0 { b"]\n" } else { b"\n]\n" };
            self.writer.write_all(tail)?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Create a record writer for a file, truncating it
pub fn create_record_writer<P: AsRef<Path>>(
    path: P,
    format: OutputFormat,
) -> Result<RecordWriter<BufWriter<File>>> {
    let file = File::create(path)?;
    let buf_writer = BufWriter::with_capacity(64 * 1024, file);

    RecordWriter::new(buf_writer, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn records() -> Vec<Record> {
        vec![
            Record::from_value(json!({"Content": "第一", "Length": 2})).unwrap(),
            Record::from_value(json!({"Content": "second", "Length": 6})).unwrap(),
        ]
    }

    fn write_all(format: OutputFormat, records: &[Record]) -> String {
        let mut writer = RecordWriter::new(Vec::new(), format).unwrap();
        for record in records {
            writer.write_record(record).unwrap();
        }
        assert_eq!(writer.records_written(), records.len() as u64);
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_json_lines() {
        let out = write_all(OutputFormat::JsonLines, &records());
        assert_eq!(
            out,
            "{\"Content\":\"第一\",\"Length\":2}\n{\"Content\":\"second\",\"Length\":6}\n"
        );
    }

    #[test]
    fn test_json_array_is_a_valid_document() {
        let out = write_all(OutputFormat::JsonArray, &records());
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["Content"], "第一");

        let empty = write_all(OutputFormat::JsonArray, &[]);
        assert_eq!(serde_json::from_str::<Value>(&empty).unwrap(), json!([]));
    }

    #[test]
    fn test_content_only() {
        let mut input = records();
        input.push(Record::text("raw line"));
        let out = write_all(OutputFormat::Content, &input);
        assert_eq!(out, "第一\nsecond\nraw line\n");
    }
}
