//! Records flowing through the pipeline and the outcome of validating them

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the text body of a pretrain-shaped record
pub const CONTENT_FIELD: &str = "Content";

/// Lower-case spelling accepted when [`CONTENT_FIELD`] is absent
pub const CONTENT_FIELD_FALLBACK: &str = "content";

/// Field holding the declared length of a pretrain-shaped record
pub const LENGTH_FIELD: &str = "Length";

/// Field naming where a pretrain-shaped record came from
pub const FILE_FIELD: &str = "File";

/// Field holding the turns of a dialogue record
pub const CONVERSATIONS_FIELD: &str = "conversations";

/// Field holding the speaker of a dialogue turn
pub const ROLE_FIELD: &str = "from";

/// Field holding the text of a dialogue turn
pub const VALUE_FIELD: &str = "value";

/// How the length of a record is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthSource {
    /// The declared `Length` field, falling back to the content's character count
    #[default]
    Declared,

    /// Number of characters in the content
    Chars,

    /// Number of UTF-8 bytes in the content
    Bytes,
}

/// The payload of a record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    /// A raw line of text
    Text(String),

    /// A parsed JSON object
    Object(Map<String, Value>),
}

/// One unit of corpus data
///
/// Records are immutable once read. Stages that reshape data build a new
/// record with [`Record::derive`], which keeps the position of the original.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// File the record was read from
    origin: Option<Arc<Path>>,

    /// 1-based line (or array element) number within the origin
    line: usize,

    /// Payload
    body: RecordBody,
}

impl Record {
    /// Create a text record with no origin
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            origin: None,
            line: 0,
            body: RecordBody::Text(text.into()),
        }
    }

    /// Create a structured record with no origin
    pub fn object(fields: Map<String, Value>) -> Self {
        Self {
            origin: None,
            line: 0,
            body: RecordBody::Object(fields),
        }
    }

    /// Create a structured record from a JSON value, if it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::object(fields)),
            _ => None,
        }
    }

    /// Attach the position this record was read from
    #[must_use]
    pub fn with_origin(mut self, origin: Arc<Path>, line: usize) -> Self {
        self.origin = Some(origin);
        self.line = line;
        self
    }

    /// Build a new record at the same position with a different payload
    #[must_use]
    pub fn derive(&self, body: RecordBody) -> Self {
        Self {
            origin: self.origin.clone(),
            line: self.line,
            body,
        }
    }

    /// The payload
    pub fn body(&self) -> &RecordBody {
        &self.body
    }

    /// The file this record was read from
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// The 1-based line number within the origin (0 when unknown)
    pub fn line(&self) -> usize {
        self.line
    }

    /// Whether the payload is a parsed object
    pub fn is_structured(&self) -> bool {
        matches!(self.body, RecordBody::Object(_))
    }

    /// Look up a top-level field of a structured record
    pub fn get(&self, field: &str) -> Option<&Value> {
        match &self.body {
            RecordBody::Object(fields) => fields.get(field),
            RecordBody::Text(_) => None,
        }
    }

    /// The text body: the whole line of a text record, or the content field of an object
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Text(text) => Some(text),
            RecordBody::Object(fields) => fields
                .get(CONTENT_FIELD)
                .or_else(|| fields.get(CONTENT_FIELD_FALLBACK))
                .and_then(Value::as_str),
        }
    }

    /// The non-negative integer `Length` field, if declared
    pub fn declared_length(&self) -> Option<u64> {
        self.get(LENGTH_FIELD).and_then(Value::as_u64)
    }

    /// Length of this record under the given policy
    pub fn length(&self, source: LengthSource) -> usize {
        let content = self.content().unwrap_or_default();
        match source {
            LengthSource::Declared => self
                .declared_length()
                .and_then(|len| usize::try_from(len).ok())
                .unwrap_or_else(|| content.chars().count()),
            LengthSource::Chars => content.chars().count(),
            LengthSource::Bytes => content.len(),
        }
    }

    /// Number of characters in the serialized form of the whole record
    pub fn serialized_size(&self) -> usize {
        match &self.body {
            RecordBody::Text(text) => text.chars().count(),
            RecordBody::Object(fields) => serde_json::to_string(fields)
                .map_or(usize::MAX, |encoded| encoded.chars().count()),
        }
    }

    /// The payload as a JSON value
    pub fn to_value(&self) -> Value {
        match &self.body {
            RecordBody::Text(text) => Value::String(text.clone()),
            RecordBody::Object(fields) => Value::Object(fields.clone()),
        }
    }

    /// Encode as a single output line, without the trailing newline
    ///
    /// Objects are written as compact JSON with non-ASCII text kept as-is;
    /// text records are written verbatim.
    pub fn encode_line(&self) -> crate::Result<String> {
        match &self.body {
            RecordBody::Text(text) => Ok(text.clone()),
            RecordBody::Object(fields) => Ok(serde_json::to_string(fields)?),
        }
    }
}

/// Why a record was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The line could not be decoded into a record
    Malformed,

    /// Garbled text or wrong script
    ContentQuality,

    /// The record does not have the shape the schema mode requires
    Schema,

    /// Length or serialized size out of bounds
    Length,
}

impl RejectReason {
    /// Every reason, in reporting order
    pub const ALL: [RejectReason; 4] = [
        RejectReason::Malformed,
        RejectReason::ContentQuality,
        RejectReason::Schema,
        RejectReason::Length,
    ];

    /// Stable index of this reason into [`RejectReason::ALL`]
    pub fn index(self) -> usize {
        match self {
            RejectReason::Malformed => 0,
            RejectReason::ContentQuality => 1,
            RejectReason::Schema => 2,
            RejectReason::Length => 3,
        }
    }

    /// Short name used in logs and reports
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Malformed => "malformed",
            RejectReason::ContentQuality => "content-quality",
            RejectReason::Schema => "schema",
            RejectReason::Length => "length",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejection and the stage that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Why the record was rejected
    pub reason: RejectReason,

    /// Name of the rejecting stage
    pub stage: &'static str,
}

impl Rejection {
    /// Create a new rejection
    pub fn new(reason: RejectReason, stage: &'static str) -> Self {
        Self { reason, stage }
    }
}

/// Result of reading or validating a single record
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The record survived
    Accepted(Record),

    /// The record was dropped
    Rejected(Rejection),
}

impl ValidationOutcome {
    /// Whether the record survived
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    /// The surviving record, if any
    pub fn accepted(self) -> Option<Record> {
        match self {
            ValidationOutcome::Accepted(record) => Some(record),
            ValidationOutcome::Rejected(_) => None,
        }
    }

    /// The rejection reason, if rejected
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            ValidationOutcome::Accepted(_) => None,
            ValidationOutcome::Rejected(rejection) => Some(rejection.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_content_resolution() {
        assert_eq!(Record::text("plain").content(), Some("plain"));
        assert_eq!(record(json!({"Content": "upper"})).content(), Some("upper"));
        assert_eq!(record(json!({"content": "lower"})).content(), Some("lower"));
        assert_eq!(record(json!({"Content": 3})).content(), None);
        assert_eq!(record(json!({"other": "x"})).content(), None);
    }

    #[test]
    fn test_length_sources() {
        let declared = record(json!({"Content": "你好", "Length": 10}));
        assert_eq!(declared.length(LengthSource::Declared), 10);
        assert_eq!(declared.length(LengthSource::Chars), 2);
        assert_eq!(declared.length(LengthSource::Bytes), 6);

        let undeclared = record(json!({"Content": "abc"}));
        assert_eq!(undeclared.length(LengthSource::Declared), 3);

        let negative = record(json!({"Content": "abcd", "Length": -1}));
        assert_eq!(negative.length(LengthSource::Declared), 4);
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("text")).is_none());
        assert!(Record::from_value(json!({})).is_some());
    }

    #[test]
    fn test_derive_keeps_position() {
        let origin: Arc<Path> = Arc::from(Path::new("data/a.jsonl"));
        let original = Record::text("x").with_origin(origin, 7);
        let derived = original.derive(RecordBody::Text("y".into()));
        assert_eq!(derived.origin(), Some(Path::new("data/a.jsonl")));
        assert_eq!(derived.line(), 7);
        assert_eq!(derived.content(), Some("y"));
        assert_eq!(original.content(), Some("x"));
    }

    #[test]
    fn test_encode_line_keeps_non_ascii() {
        let line = record(json!({"Content": "中文"})).encode_line().unwrap();
        assert_eq!(line, r#"{"Content":"中文"}"#);
        assert_eq!(Record::text("raw line").encode_line().unwrap(), "raw line");
    }

    #[test]
    fn test_serialized_size_counts_chars() {
        let rec = record(json!({"a": "é"}));
        assert_eq!(rec.serialized_size(), r#"{"a":"é"}"#.chars().count());
    }

    #[test]
    fn test_reason_indices_match_order() {
        for (i, reason) in RejectReason::ALL.iter().enumerate() {
            assert_eq!(reason.index(), i);
        }
    }
}
