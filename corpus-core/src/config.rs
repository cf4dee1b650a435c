//! Pipeline configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::LengthSource;

/// Suffixes scanned when none are configured
pub const DEFAULT_SUFFIXES: [&str; 3] = [".jsonl", ".txt", ".json"];

/// File name recorded on records flattened from dialogues
pub const DEFAULT_FLATTENED_FILE_NAME: &str = "sft-conversation.json";

/// How input files are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputFormat {
    /// One JSON object per line
    #[default]
    #[serde(rename = "jsonl")]
    JsonLines,

    /// One raw text record per line
    #[serde(rename = "text")]
    Text,

    /// A single JSON array document per file
    #[serde(rename = "json-array")]
    JsonArray,

    /// Pick by file extension: `.json` is an array, `.txt` is text, anything else is JSON lines
    #[serde(rename = "auto")]
    Auto,
}

/// How accepted records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    #[serde(rename = "jsonl")]
    JsonLines,

    /// One JSON array document per shard
    #[serde(rename = "json-array")]
    JsonArray,

    /// The content of each record as a plain text line
    #[serde(rename = "content")]
    Content,
}

/// The closed set of record shapes the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaMode {
    /// Free text or pretrain-shaped records; no schema check
    #[default]
    #[serde(alias = "pretrain")]
    FreeText,

    /// Turn-based dialogues under a `conversations` field
    #[serde(alias = "sft")]
    Dialogue,

    /// Preference pairs for reward or DPO training
    #[serde(alias = "dpo")]
    PreferencePair,
}

/// Reshaping applied to records after schema validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Conversion {
    /// Leave records as read
    #[default]
    None,

    /// Join the turns of a dialogue into a pretrain record
    FlattenDialogue,

    /// Turn an `{id, content}` document into a pretrain record
    Document,
}

/// Which records survive sampling
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SamplingPolicy {
    /// Keep every accepted record
    #[default]
    KeepAll,

    /// Keep each record independently with probability `rate`
    Rate {
        /// Probability in `[0, 1]`
        rate: f64,
    },

    /// Keep `count` records chosen uniformly without replacement, shuffled.
    /// A count of zero keeps (and shuffles) every record.
    Count {
        /// Requested number of records
        count: usize,
    },

    /// Shuffle and keep `floor(accepted * ratio)` records
    Ratio {
        /// Fraction in `[0, 1]`
        ratio: f64,
    },
}

impl SamplingPolicy {
    /// Whether this policy must see every accepted record before selecting
    pub fn needs_materialization(&self) -> bool {
        matches!(self, SamplingPolicy::Count { .. } | SamplingPolicy::Ratio { .. })
    }
}

/// Inclusive length bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBounds {
    /// Smallest accepted length
    pub min: usize,

    /// Largest accepted length
    pub max: usize,

    /// How the length is measured
    #[serde(default)]
    pub source: LengthSource,
}

impl LengthBounds {
    /// Create bounds measured by the declared length
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            min,
            max,
            source: LengthSource::Declared,
        }
    }

    /// Whether `len` lies within the bounds
    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

/// The two roles a dialogue alternates between, opening role first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueRoles {
    /// Role of turns at even indices
    pub opening: String,

    /// Role of turns at odd indices
    pub reply: String,
}

impl Default for DialogueRoles {
    fn default() -> Self {
        Self {
            opening: "human".to_string(),
            reply: "gpt".to_string(),
        }
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directories (or files) to scan
    pub inputs: Vec<PathBuf>,

    /// Accepted file name suffixes, matched case-insensitively
    pub suffixes: Vec<String>,

    /// How input files are decoded
    pub input_format: InputFormat,

    /// Output path, or shard base name when `shards > 1`
    pub output: PathBuf,

    /// How accepted records are written
    pub output_format: OutputFormat,

    /// Number of worker threads (0 = available parallelism)
    pub workers: usize,

    /// Length bounds, if filtering by length
    pub length: Option<LengthBounds>,

    /// Largest serialized record size, in characters
    pub size_budget: Option<usize>,

    /// Reject garbled content
    pub reject_garbled: bool,

    /// Largest tolerated fraction of disallowed characters
    pub garbled_threshold: f64,

    /// Require content to be mostly CJK ideographs
    pub require_script: bool,

    /// Smallest fraction of CJK ideographs that passes (exclusive)
    pub script_threshold: f64,

    /// Expected record shape
    pub schema: SchemaMode,

    /// Roles for dialogue validation
    pub dialogue_roles: DialogueRoles,

    /// Reshaping applied after schema validation
    pub conversion: Conversion,

    /// `File` value written by the dialogue flattener
    pub flattened_file_name: String,

    /// Sampling policy
    pub sampling: SamplingPolicy,

    /// Run count sampling as a single streaming reservoir pass
    pub reservoir: bool,

    /// Seed for every random decision in the run
    pub seed: Option<u64>,

    /// Number of output shards (`<= 1` means a single output)
    pub shards: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            suffixes: DEFAULT_SUFFIXES.iter().map(ToString::to_string).collect(),
            input_format: InputFormat::default(),
            output: PathBuf::new(),
            output_format: OutputFormat::default(),
            workers: 0,
            length: None,
            size_budget: None,
            reject_garbled: false,
            garbled_threshold: 0.5,
            require_script: false,
            script_threshold: 0.5,
            schema: SchemaMode::default(),
            dialogue_roles: DialogueRoles::default(),
            conversion: Conversion::default(),
            flattened_file_name: DEFAULT_FLATTENED_FILE_NAME.to_string(),
            sampling: SamplingPolicy::default(),
            reservoir: false,
            seed: None,
            shards: 1,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the options are consistent
    pub fn validate(&self) -> Result<()> {
        if self.output.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("output path is empty".into()));
        }

        if let Some(bounds) = &self.length {
            if bounds.min > bounds.max {
                return Err(Error::InvalidConfig(format!(
                    "min length {} exceeds max length {}",
                    bounds.min, bounds.max
                )));
            }
        }

        for (name, value) in [
            ("garbled_threshold", self.garbled_threshold),
            ("script_threshold", self.script_threshold),
        ] {
            check_unit_interval(name, value)?;
        }

        match self.sampling {
            SamplingPolicy::Rate { rate } => check_unit_interval("sample rate", rate)?,
            SamplingPolicy::Ratio { ratio } => check_unit_interval("sample ratio", ratio)?,
            SamplingPolicy::KeepAll | SamplingPolicy::Count { .. } => {}
        }

        if self.conversion == Conversion::FlattenDialogue && self.schema != SchemaMode::Dialogue {
            return Err(Error::InvalidConfig(
                "flatten-dialogue conversion requires the dialogue schema".into(),
            ));
        }

        Ok(())
    }

    /// Worker count with 0 resolved to the available parallelism
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// Shard count with values below one resolved to one
    pub fn effective_shards(&self) -> usize {
        self.shards.max(1)
    }

    /// Trimmed, lower-cased suffixes; the defaults when none are configured
    pub fn normalized_suffixes(&self) -> Vec<String> {
        let suffixes: Vec<String> = self
            .suffixes
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if suffixes.is_empty() {
            DEFAULT_SUFFIXES.iter().map(ToString::to_string).collect()
        } else {
            suffixes
        }
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    fn config() -> PipelineConfig {
        PipelineConfig {
            output: PathBuf::from("out.jsonl"),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_valid_once_output_is_set() {
        assert!(PipelineConfig::default().validate().is_err());
        config().validate().unwrap();
    }

    #[test_case(SamplingPolicy::Rate { rate: 1.5 } ; "rate above one")]
    #[test_case(SamplingPolicy::Rate { rate: -0.1 } ; "negative rate")]
    #[test_case(SamplingPolicy::Ratio { ratio: 2.0 } ; "ratio above one")]
    fn test_sampling_out_of_range(sampling: SamplingPolicy) {
        let cfg = PipelineConfig { sampling, ..config() };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_inverted_length_bounds() {
        let cfg = PipelineConfig {
            length: Some(LengthBounds::new(10, 5)),
            ..config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_flatten_requires_dialogue() {
        let cfg = PipelineConfig {
            conversion: Conversion::FlattenDialogue,
            ..config()
        };
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig {
            schema: SchemaMode::Dialogue,
            ..cfg
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn test_normalized_suffixes() {
        let cfg = PipelineConfig {
            suffixes: vec![" .JSONL".into(), String::new(), "txt".into()],
            ..config()
        };
        assert_eq!(cfg.normalized_suffixes(), vec![".jsonl", "txt"]);

        let cfg = PipelineConfig {
            suffixes: Vec::new(),
            ..config()
        };
        assert_eq!(cfg.normalized_suffixes(), vec![".jsonl", ".txt", ".json"]);
    }

    #[test]
    fn test_effective_values() {
        let cfg = PipelineConfig {
            workers: 3,
            shards: 0,
            ..config()
        };
        assert_eq!(cfg.effective_workers(), 3);
        assert_eq!(cfg.effective_shards(), 1);
        assert!(config().effective_workers() >= 1);
    }

    #[test]
    fn test_from_json_file_with_aliases() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "inputs": ["data"],
                "output": "out.json",
                "output_format": "json-array",
                "schema": "sft",
                "sampling": {{"mode": "count", "count": 500}},
                "length": {{"min": 0, "max": 4090}},
                "shards": 4
            }}"#
        )
        .unwrap();

        let cfg = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.schema, SchemaMode::Dialogue);
        assert_eq!(cfg.output_format, OutputFormat::JsonArray);
        assert_eq!(cfg.sampling, SamplingPolicy::Count { count: 500 });
        assert_eq!(cfg.length.unwrap().source, LengthSource::Declared);
        assert_eq!(cfg.shards, 4);
        assert_eq!(cfg.garbled_threshold, 0.5);
        assert!(cfg.sampling.needs_materialization());
    }
}
