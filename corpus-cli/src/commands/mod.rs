pub mod filter;
pub mod run;

use std::time::Duration;

use anyhow::{Context, Result};
use corpus_core::PipelineConfig;
use corpus_parallel::{Coordinator, RunReport};
use tokio::time::{interval_at, Instant};

/// How often progress is logged while a run is in flight
const PROGRESS_EVERY: Duration = Duration::from_secs(5);

/// Run a pipeline to completion on a blocking thread, logging progress and
/// turning Ctrl-C into a cooperative cancellation.
pub async fn execute_pipeline(config: PipelineConfig, json: bool) -> Result<()> {
    let coordinator = Coordinator::new(config).context("Invalid pipeline configuration")?;
    let token = coordinator.cancellation_token();
    let counters = coordinator.counters();

    tracing::info!(
        run_id = %coordinator.run_id(),
        inputs = coordinator.config().inputs.len(),
        output = %coordinator.config().output.display(),
        "Pipeline configured"
    );

    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight records");
            interrupt.cancel();
        }
    });

    let mut task = tokio::task::spawn_blocking(move || coordinator.run());
    let mut progress = interval_at(Instant::now() + PROGRESS_EVERY, PROGRESS_EVERY);

    let report = loop {
        tokio::select! {
            joined = &mut task => {
                break joined
                    .context("Pipeline worker panicked")?
                    .context("Pipeline run failed")?;
            }
            _ = progress.tick() => {
                let snapshot = counters.snapshot();
                tracing::info!(
                    files_done = snapshot.files_processed,
                    files = snapshot.files_discovered,
                    accepted = snapshot.accepted,
                    written = snapshot.written,
                    "Progress"
                );
            }
        }
    };

    print_report(&report, json)
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Run {} finished: {}", report.run_id, report.state);
    println!("  Seed:            {}", report.seed);
    println!(
        "  Files:           {} processed of {} discovered, {} failed",
        report.files_processed,
        report.files_discovered,
        report.failed_files.len()
    );
    println!("  Records read:    {}", report.records_read);
    println!("  Accepted:        {}", report.accepted);
    println!(
        "  Rejected:        {} (malformed {}, content {}, schema {}, length {})",
        report.rejected.total(),
        report.rejected.malformed,
        report.rejected.content_quality,
        report.rejected.schema,
        report.rejected.length
    );
    println!("  Sampled out:     {}", report.sampled_out);
    println!("  Written:         {}", report.written);
    println!("  Duration:        {:.2}s", report.elapsed.as_secs_f64());

    for (path, count) in report.outputs.iter().zip(&report.shard_counts) {
        println!("  -> {} ({count} records)", path.display());
    }
    for failure in &report.failed_files {
        println!("  failed: {}: {}", failure.path.display(), failure.error);
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }

    Ok(())
}
