use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use corpus_core::config::DEFAULT_FLATTENED_FILE_NAME;
use corpus_core::{
    Conversion, DialogueRoles, InputFormat, LengthBounds, LengthSource, OutputFormat,
    PipelineConfig, SamplingPolicy, SchemaMode,
};
use serde::de::DeserializeOwned;

/// Lower length bound used when `--min-len` is not given, capped at the upper bound
const DEFAULT_MIN_LEN: usize = 256;

/// Upper length bound used when `--max-len` is not given, raised to the lower bound
const DEFAULT_MAX_LEN: usize = 1024;

/// Parse a kebab-case option value through its serde representation
fn parse_kebab<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|e| e.to_string())
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Input directories or files
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output file, or base name of the shards when splitting
    #[arg(short, long)]
    output: PathBuf,

    /// Worker threads (0 = available parallelism)
    #[arg(short = 't', long = "threads", default_value_t = 0)]
    workers: usize,

    /// Comma-separated file suffixes to include
    #[arg(short, long = "suffix", value_delimiter = ',', default_value = ".jsonl,.txt,.json")]
    suffixes: Vec<String>,

    /// How input files are decoded (jsonl, text, json-array, auto)
    #[arg(long, default_value = "jsonl", value_parser = parse_kebab::<InputFormat>)]
    input_format: InputFormat,

    /// How records are written (jsonl, json-array, content)
    #[arg(long, default_value = "jsonl", value_parser = parse_kebab::<OutputFormat>)]
    output_format: OutputFormat,

    /// Filter by length with the default bounds
    #[arg(long)]
    length_filter: bool,

    /// Smallest accepted length (enables the length filter)
    #[arg(long)]
    min_len: Option<usize>,

    /// Largest accepted length (enables the length filter)
    #[arg(long)]
    max_len: Option<usize>,

    /// How length is measured (declared, chars, bytes)
    #[arg(long, default_value = "declared", value_parser = parse_kebab::<LengthSource>)]
    length_source: LengthSource,

    /// Reject records whose serialized form is longer than this many characters
    #[arg(long)]
    size_budget: Option<usize>,

    /// Keep only records that are mostly Chinese
    #[arg(long)]
    only_zh: bool,

    /// Fraction of CJK ideographs that must be exceeded
    #[arg(long, default_value_t = 0.5)]
    script_threshold: f64,

    /// Reject garbled records
    #[arg(long)]
    no_messy: bool,

    /// Fraction of disallowed characters above which a record is garbled
    #[arg(long, default_value_t = 0.5)]
    garbled_threshold: f64,

    /// Expected record shape (free-text, dialogue, preference-pair; sft, dpo, pretrain)
    #[arg(long, default_value = "free-text", value_parser = parse_kebab::<SchemaMode>)]
    schema: SchemaMode,

    /// Role of the first and every even dialogue turn
    #[arg(long, default_value = "human")]
    opening_role: String,

    /// Role of every odd dialogue turn
    #[arg(long, default_value = "gpt")]
    reply_role: String,

    /// Reshape records (none, flatten-dialogue, document)
    #[arg(long, default_value = "none", value_parser = parse_kebab::<Conversion>)]
    convert: Conversion,

    /// `File` value of flattened dialogues
    #[arg(long, default_value = DEFAULT_FLATTENED_FILE_NAME)]
    file_name: String,

    /// Keep each record with this probability
    #[arg(long, conflicts_with_all = ["sample_count", "ratio"])]
    sample_rate: Option<f64>,

    /// Keep this many records, shuffled (0 or less keeps all, shuffled)
    #[arg(long, allow_negative_numbers = true, conflicts_with = "ratio")]
    sample_count: Option<i64>,

    /// Keep this fraction of records, shuffled
    #[arg(long)]
    ratio: Option<f64>,

    /// Select the sample count in one streaming pass
    #[arg(long, requires = "sample_count")]
    reservoir: bool,

    /// Number of output shards (1 or less writes a single file)
    #[arg(long, default_value_t = 1)]
    split: usize,

    /// Seed for every random decision
    #[arg(long)]
    seed: Option<u64>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

impl FilterArgs {
    /// Build the pipeline configuration these flags describe
    pub fn to_config(&self) -> PipelineConfig {
        let enabled = self.length_filter || self.min_len.is_some() || self.max_len.is_some();
        let length = enabled.then(|| {
            let min = self
                .min_len
                .unwrap_or_else(|| DEFAULT_MIN_LEN.min(self.max_len.unwrap_or(DEFAULT_MAX_LEN)));
            LengthBounds {
                min,
                max: self.max_len.unwrap_or(DEFAULT_MAX_LEN.max(min)),
                source: self.length_source,
            }
        });

        let sampling = match (self.sample_rate, self.sample_count, self.ratio) {
            (Some(rate), _, _) => SamplingPolicy::Rate { rate },
            (None, Some(count), _) => SamplingPolicy::Count {
                count: usize::try_from(count).unwrap_or(0),
            },
            (None, None, Some(ratio)) => SamplingPolicy::Ratio { ratio },
            (None, None, None) => SamplingPolicy::KeepAll,
        };

        PipelineConfig {
            inputs: self.inputs.clone(),
            suffixes: self.suffixes.clone(),
            input_format: self.input_format,
            output: self.output.clone(),
            output_format: self.output_format,
            workers: self.workers,
            length,
            size_budget: self.size_budget,
            reject_garbled: self.no_messy,
            garbled_threshold: self.garbled_threshold,
            require_script: self.only_zh,
            script_threshold: self.script_threshold,
            schema: self.schema,
            dialogue_roles: DialogueRoles {
                opening: self.opening_role.clone(),
                reply: self.reply_role.clone(),
            },
            conversion: self.convert,
            flattened_file_name: self.file_name.clone(),
            sampling,
            reservoir: self.reservoir,
            seed: self.seed,
            shards: self.split,
        }
    }
}

/// Execute the `filter` command.
pub async fn execute(args: FilterArgs) -> Result<()> {
    let config = args.to_config();
    super::execute_pipeline(config, args.json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: FilterArgs,
    }

    fn parse(extra: &[&str]) -> PipelineConfig {
        let mut argv = vec!["corpus", "-i", "data", "-o", "out.jsonl"];
        argv.extend_from_slice(extra);
        Wrapper::try_parse_from(argv).unwrap().args.to_config()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.inputs, vec![PathBuf::from("data")]);
        assert_eq!(config.suffixes, vec![".jsonl", ".txt", ".json"]);
        assert_eq!(config.length, None);
        assert_eq!(config.sampling, SamplingPolicy::KeepAll);
        assert_eq!(config.shards, 1);
        assert!(!config.reject_garbled);
        config.validate().unwrap();
    }

    #[test]
    fn test_length_flags() {
        assert_eq!(parse(&["--length-filter"]).length, Some(LengthBounds::new(256, 1024)));
        assert_eq!(parse(&["--max-len", "4090"]).length, Some(LengthBounds::new(256, 4090)));

        let chars = parse(&["--min-len", "0", "--length-source", "chars"]).length.unwrap();
        assert_eq!((chars.min, chars.max, chars.source), (0, 1024, LengthSource::Chars));
    }

    #[test]
    fn test_single_length_bound_never_inverts() {
        let short = parse(&["--max-len", "100"]);
        assert_eq!(short.length, Some(LengthBounds::new(100, 100)));
        short.validate().unwrap();

        let long = parse(&["--min-len", "2000"]);
        assert_eq!(long.length, Some(LengthBounds::new(2000, 2000)));
        long.validate().unwrap();
    }

    #[test]
    fn test_sampling_flags() {
        assert_eq!(
            parse(&["--sample-rate", "0.3"]).sampling,
            SamplingPolicy::Rate { rate: 0.3 }
        );
        assert_eq!(
            parse(&["--sample-count", "-1"]).sampling,
            SamplingPolicy::Count { count: 0 }
        );
        assert_eq!(
            parse(&["--ratio", "0.5"]).sampling,
            SamplingPolicy::Ratio { ratio: 0.5 }
        );

        let argv = ["corpus", "-i", "d", "-o", "o", "--sample-rate", "0.1", "--sample-count", "3"];
        assert!(Wrapper::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_schema_aliases_and_suffix_list() {
        let config = parse(&[
            "--schema",
            "sft",
            "--convert",
            "flatten-dialogue",
            "-s",
            ".jsonl,.json",
            "--output-format",
            "json-array",
            "--split",
            "4",
        ]);
        assert_eq!(config.schema, SchemaMode::Dialogue);
        assert_eq!(config.conversion, Conversion::FlattenDialogue);
        assert_eq!(config.suffixes, vec![".jsonl", ".json"]);
        assert_eq!(config.output_format, OutputFormat::JsonArray);
        assert_eq!(config.shards, 4);
        config.validate().unwrap();

        let argv = ["corpus", "-i", "d", "-o", "o", "--schema", "chat"];
        assert!(Wrapper::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_multiple_inputs() {
        let config = parse(&["-i", "more", "-t", "8", "--no-messy", "--only-zh", "--seed", "7"]);
        assert_eq!(config.inputs, vec![PathBuf::from("data"), PathBuf::from("more")]);
        assert_eq!(config.workers, 8);
        assert!(config.reject_garbled && config.require_script);
        assert_eq!(config.seed, Some(7));
    }
}
