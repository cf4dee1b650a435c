//! Whole-document JSON array reading

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use corpus_core::{Record, RecordSource, RejectReason, Rejection, ValidationOutcome};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::text::READER_STAGE;

/// Reads a file holding a single JSON array, yielding one record per element
///
/// The document is decoded up front, so a file that is not a JSON array
/// fails at [`JsonArrayReader::open`]. Elements that are not objects are
/// reported as malformed rejections.
pub struct JsonArrayReader {
    /// File the elements come from
    origin: Arc<Path>,

    /// Remaining elements
    elements: std::vec::IntoIter<Value>,

    /// Elements consumed so far
    position: usize,
}

impl JsonArrayReader {
    /// Open and decode a JSON array document
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let elements = decode_document(path)?;
        Ok(Self::from_values(path, elements))
    }

    /// Iterate over already decoded elements, labelling records with `origin`
    pub fn from_values<P: AsRef<Path>>(origin: P, elements: Vec<Value>) -> Self {
        Self {
            origin: Arc::from(origin.as_ref()),
            elements: elements.into_iter(),
            position: 0,
        }
    }
}

#[cfg(feature = "mmap")]
#[allow(unsafe_code)]
fn decode_document(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }

    // SAFETY: the map is read-only and dropped before this function returns.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    parse_array(path, &mmap)
}

#[cfg(not(feature = "mmap"))]
fn decode_document(path: &Path) -> Result<Vec<Value>> {
    use std::io::Read;

    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    parse_array(path, &bytes)
}

fn parse_array(path: &Path, bytes: &[u8]) -> Result<Vec<Value>> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Array(elements)) => Ok(elements),
        Ok(_) => Err(Error::Format {
            path: PathBuf::from(path),
            message: "expected a JSON array document".into(),
        }),
        Err(err) => Err(Error::Format {
            path: PathBuf::from(path),
            message: err.to_string(),
        }),
    }
}

impl Iterator for JsonArrayReader {
    type Item = corpus_core::Result<ValidationOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.elements.next()?;
        self.position += 1;

        let outcome = match Record::from_value(value) {
            Some(record) => {
                ValidationOutcome::Accepted(record.with_origin(self.origin.clone(), self.position))
            }
            None => {
                ValidationOutcome::Rejected(Rejection::new(RejectReason::Malformed, READER_STAGE))
            }
        };
        Some(Ok(outcome))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl RecordSource for JsonArrayReader {
    fn origin(&self) -> &Path {
        &self.origin
    }

    fn lines_read(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_reads_elements_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("samples.json");
        fs::write(&path, r#"[{"id": 1}, 7, {"id": 2}]"#).unwrap();

        let outcomes: Vec<_> = JsonArrayReader::open(&path)
            .unwrap()
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[1].reason(), Some(RejectReason::Malformed));

        let second = outcomes[2].clone().accepted().unwrap();
        assert_eq!(second.line(), 3);
        assert_eq!(second.get("id"), Some(&Value::from(2)));
        assert_eq!(second.origin(), Some(path.as_path()));
    }

    #[test]
    fn test_empty_file_has_no_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "").unwrap();
        assert_eq!(JsonArrayReader::open(&path).unwrap().count(), 0);
    }

    #[test]
    fn test_non_array_document_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("object.json");
        fs::write(&path, r#"{"id": 1}"#).unwrap();
        assert!(matches!(JsonArrayReader::open(&path), Err(Error::Format { .. })));

        fs::write(&path, "[{\"id\": 1},").unwrap();
        assert!(matches!(JsonArrayReader::open(&path), Err(Error::Format { .. })));
    }
}
