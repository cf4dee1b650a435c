//! Assembling the validator chain from a pipeline configuration

use corpus_core::{Conversion, PipelineConfig, SchemaMode, ValidatorChain};
use tracing::debug;

use crate::convert::{DocumentToPretrain, FlattenDialogue};
use crate::length::{LengthFilter, SizeBudgetFilter};
use crate::quality::{GarbledTextFilter, ScriptRatioFilter};
use crate::schema::{DialogueSchemaValidator, PreferencePairValidator};

/// Build the chain for `config`
///
/// Stages run in this order: schema validation, size budget, conversion,
/// garbled text, script ratio, length. Shape checks come first so the
/// conversions only see records they can handle, and the content checks
/// run on the converted content.
pub fn build_chain(config: &PipelineConfig) -> ValidatorChain {
    let mut chain = ValidatorChain::default();

    match config.schema {
        SchemaMode::FreeText => {}
        SchemaMode::Dialogue => {
            chain.push(DialogueSchemaValidator::new(config.dialogue_roles.clone()));
        }
        SchemaMode::PreferencePair => chain.push(PreferencePairValidator),
    }

    if let Some(budget) = config.size_budget {
        chain.push(SizeBudgetFilter::new(budget));
    }

    match config.conversion {
        Conversion::None => {}
        Conversion::FlattenDialogue => {
            chain.push(FlattenDialogue::new(config.flattened_file_name.clone()));
        }
        Conversion::Document => chain.push(DocumentToPretrain),
    }

    if config.reject_garbled {
        chain.push(GarbledTextFilter::new(config.garbled_threshold));
    }

    if config.require_script {
        chain.push(ScriptRatioFilter::new(config.script_threshold));
    }

    if let Some(bounds) = config.length {
        chain.push(LengthFilter::new(bounds));
    }

    debug!(stages = ?chain.stage_names(), "Built validator chain");
    chain
}
