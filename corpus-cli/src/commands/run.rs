use std::path::Path;

use anyhow::{Context, Result};
use corpus_core::PipelineConfig;

/// Execute the `run` command: load a JSON configuration and run it.
pub async fn execute(config_path: &Path, json: bool) -> Result<()> {
    let config = PipelineConfig::from_json_file(config_path)
        .with_context(|| format!("Failed to load configuration: {}", config_path.display()))?;

    super::execute_pipeline(config, json).await
}
