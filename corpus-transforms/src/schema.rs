//! Schema validators for dialogue and preference-pair records

use corpus_core::record::{CONVERSATIONS_FIELD, ROLE_FIELD};
use corpus_core::{DialogueRoles, Record, RejectReason, Stage};
use serde_json::Value;

/// Field triples accepted as a preference pair
pub const PREFERENCE_TRIPLES: [[&str; 3]; 2] = [
    ["query", "sft_answer", "model_answer"],
    ["question", "response_j", "response_k"],
];

/// Validates turn-based dialogues
///
/// A record passes only if its `conversations` field is an array of at least
/// two turns and turn `i` carries the opening role when `i` is even and the
/// reply role when `i` is odd. Any turn that is not an object, or lacks a
/// string role, rejects the whole record.
#[derive(Debug, Clone, Default)]
pub struct DialogueSchemaValidator {
    roles: DialogueRoles,
}

impl DialogueSchemaValidator {
    /// Create a validator for the given role pair
    pub fn new(roles: DialogueRoles) -> Self {
        Self { roles }
    }

    /// Check a `conversations` value
    pub fn is_valid_dialogue(&self, conversations: &Value) -> bool {
        let Some(turns) = conversations.as_array() else {
            return false;
        };

        if turns.len() < 2 {
            return false;
        }

        turns.iter().enumerate().all(|(i, turn)| {
            let expected = if i % 2 == 0 {
                &self.roles.opening
            } else {
                &self.roles.reply
            };
            turn.get(ROLE_FIELD).and_then(Value::as_str) == Some(expected.as_str())
        })
    }
}

impl Stage for DialogueSchemaValidator {
    fn name(&self) -> &'static str {
        "dialogue-schema"
    }

    fn reason(&self) -> RejectReason {
        RejectReason::Schema
    }

    fn accepts(&self, record: &Record) -> bool {
        record
            .get(CONVERSATIONS_FIELD)
            .is_some_and(|conversations| self.is_valid_dialogue(conversations))
    }
}

/// Validates preference pairs
///
/// Exactly one of [`PREFERENCE_TRIPLES`] must be present in full. Records
/// with a partial triple, or with both triples, are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferencePairValidator;

impl PreferencePairValidator {
    /// Index of the triple the record carries, if exactly one matches
    pub fn matching_triple(record: &Record) -> Option<usize> {
        let mut matches = PREFERENCE_TRIPLES
            .iter()
            .enumerate()
            .filter(|(_, fields)| fields.iter().all(|field| record.get(field).is_some()))
            .map(|(i, _)| i);

        match (matches.next(), matches.next()) {
            (Some(i), None) => Some(i),
            _ => None,
        }
    }
}

impl Stage for PreferencePairValidator {
    fn name(&self) -> &'static str {
        "preference-pair-schema"
    }

    fn reason(&self) -> RejectReason {
        RejectReason::Schema
    }

    fn accepts(&self, record: &Record) -> bool {
        Self::matching_triple(record).is_some()
    }
}
