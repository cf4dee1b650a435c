//! Validator stages and format conversions for the corpus pipeline
//!
//! Every stage implements [`corpus_core::Stage`]. Predicates (content
//! quality, length, schema) accept or reject; conversions reshape dialogue
//! and document records into pretrain records. [`build_chain`] assembles the
//! stages a [`corpus_core::PipelineConfig`] asks for.

pub mod builder;
pub mod convert;
pub mod length;
pub mod quality;
pub mod schema;

pub use builder::build_chain;
pub use convert::{pretrain_fields, DocumentToPretrain, FlattenDialogue};
pub use length::{LengthFilter, SizeBudgetFilter};
pub use quality::{GarbledTextFilter, ScriptRatioFilter, CJK_IDEOGRAPHS};
pub use schema::{DialogueSchemaValidator, PreferencePairValidator, PREFERENCE_TRIPLES};

// Re-export core types
pub use corpus_core::{Stage, ValidatorChain};
