//! Stages that reshape records into the pretrain shape
//!
//! Both conversions produce `{"Content", "File", "Length"}` objects, with
//! `Length` set to the character count of `Content`. Inputs that do not have
//! the fields a conversion needs are rejected as schema violations.

use corpus_core::record::{
    CONTENT_FIELD, CONVERSATIONS_FIELD, FILE_FIELD, LENGTH_FIELD, VALUE_FIELD,
};
use corpus_core::{
    Record, RecordBody, RejectReason, Rejection, Stage, ValidationOutcome,
};
use serde_json::{Map, Value};

/// Field naming a document in `{id, content}` items
pub const DOCUMENT_ID_FIELD: &str = "id";

/// Field holding the text of `{id, content}` items
pub const DOCUMENT_CONTENT_FIELD: &str = "content";

/// Build a pretrain-shaped object
pub fn pretrain_fields(content: String, file: Value) -> Map<String, Value> {
    let length = content.chars().count();

    let mut fields = Map::new();
    fields.insert(CONTENT_FIELD.to_string(), Value::String(content));
    fields.insert(FILE_FIELD.to_string(), file);
    fields.insert(LENGTH_FIELD.to_string(), Value::from(length));
    fields
}

/// Joins the turn values of a dialogue into one pretrain record
///
/// Every turn value is followed by a newline and the joined text is trimmed.
#[derive(Debug, Clone)]
pub struct FlattenDialogue {
    file_name: String,
}

impl FlattenDialogue {
    /// Create a flattener recording `file_name` as the `File` of its output
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Join the turn values of a `conversations` array
    pub fn flatten(conversations: &Value) -> Option<String> {
        let turns = conversations.as_array()?;

        let mut joined = String::new();
        for turn in turns {
            joined.push_str(turn.get(VALUE_FIELD)?.as_str()?);
            joined.push('\n');
        }

        Some(joined.trim().to_string())
    }
}

impl Default for FlattenDialogue {
    fn default() -> Self {
        Self::new(corpus_core::config::DEFAULT_FLATTENED_FILE_NAME)
    }
}

impl Stage for FlattenDialogue {
    fn name(&self) -> &'static str {
        "flatten-dialogue"
    }

    fn reason(&self) -> RejectReason {
        RejectReason::Schema
    }

    fn apply(&self, record: Record) -> ValidationOutcome {
        match record.get(CONVERSATIONS_FIELD).and_then(Self::flatten) {
            Some(content) => {
                let fields = pretrain_fields(content, Value::String(self.file_name.clone()));
                ValidationOutcome::Accepted(record.derive(RecordBody::Object(fields)))
            }
            None => ValidationOutcome::Rejected(Rejection::new(self.reason(), self.name())),
        }
    }
}

/// Turns an `{id, content}` document into a pretrain record with `File = id`
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentToPretrain;

impl Stage for DocumentToPretrain {
    fn name(&self) -> &'static str {
        "document-to-pretrain"
    }

    fn reason(&self) -> RejectReason {
        RejectReason::Schema
    }

    fn apply(&self, record: Record) -> ValidationOutcome {
        let id = record.get(DOCUMENT_ID_FIELD).cloned();
        let content = record
            .get(DOCUMENT_CONTENT_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string);

        match (id, content) {
            (Some(id), Some(content)) => {
                let fields = pretrain_fields(content, id);
                ValidationOutcome::Accepted(record.derive(RecordBody::Object(fields)))
            }
            _ => ValidationOutcome::Rejected(Rejection::new(self.reason(), self.name())),
        }
    }
}
