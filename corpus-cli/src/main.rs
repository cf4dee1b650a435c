mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::filter::FilterArgs;

#[derive(Parser)]
#[command(
    name = "corpus",
    version,
    about = "Clean, sample and shard line-oriented text corpora"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter, sample and shard the files under one or more roots
    Filter(FilterArgs),
    /// Run a pipeline described by a JSON configuration file
    Run {
        /// Path to the pipeline configuration
        #[arg(short, long)]
        config: PathBuf,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Filter(args) => commands::filter::execute(args).await,
        Commands::Run { config, json } => commands::run::execute(&config, json).await,
    }
}
