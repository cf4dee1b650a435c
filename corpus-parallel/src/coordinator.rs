//! The pipeline coordinator
//!
//! A run moves through `Idle -> Enumerating -> Running -> [Draining] ->
//! Done | Failed | Cancelled`. Files are processed on a bounded rayon pool,
//! one task per file. Streaming policies write from the workers directly;
//! bounded policies collect candidates during `Running` and select from them
//! in `Draining`. The sink is closed on every exit path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use corpus_core::pipeline::{FileFailure, PipelineState, RunReport, StateMachine};
use corpus_core::{
    Error, PipelineConfig, Record, RecordSink, Result, RunCounters, SamplingPolicy,
    SourceFactory, ValidationOutcome, ValidatorChain,
};
use corpus_readers::{ReaderFactory, SourceEnumerator};
use corpus_shuffle::{
    random_seed, seeded_rng, BernoulliSampler, BoundedSampler, RatioSampler, ReservoirSampler,
    Selection,
};
use corpus_transforms::build_chain;
use crossbeam::queue::SegQueue;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn};
use uuid::Uuid;

use crate::sink::{shard_paths, ShardedSink};

/// Stream id of the generator used for the final selection
const SELECTION_STREAM: u64 = u64::MAX;

/// Accepted records held back for selection in `Draining`
enum Candidates {
    /// Records are written as they are accepted
    Streaming(Option<BernoulliSampler>),

    /// Every accepted record is kept
    Materialized(SegQueue<Record>),

    /// A fixed-size uniform sample is kept
    Reservoir(Mutex<ReservoirSampler<Record>>),
}

/// State shared by the workers of one run
struct RunContext<'a> {
    chain: &'a ValidatorChain,
    factory: &'a dyn SourceFactory,
    counters: &'a RunCounters,
    sink: &'a ShardedSink,
    cancel: &'a CancellationToken,
    seed: u64,
    candidates: Candidates,
    next_index: AtomicUsize,
    stop: AtomicBool,
    fatal: Mutex<Option<Error>>,
    failures: Mutex<Vec<FileFailure>>,
}

impl RunContext<'_> {
    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || self.cancel.is_cancelled()
    }

    fn process_file(&self, index: usize, path: &Path) {
        if self.should_stop() {
            return;
        }

        let mut source = match self.factory.open(path) {
            Ok(source) => source,
            Err(err) => {
                self.file_failed(path, &err);
                self.counters.file_processed();
                return;
            }
        };

        let mut rng = seeded_rng(self.seed, index as u64);
        let mut accepted = 0usize;

        while let Some(item) = source.next() {
            if self.should_stop() {
                break;
            }

            let outcome = match item {
                Ok(ValidationOutcome::Accepted(record)) => self.chain.apply(record),
                Ok(rejected) => rejected,
                Err(err) => {
                    self.file_failed(path, &err);
                    break;
                }
            };
            self.counters.record(&outcome);

            match outcome {
                ValidationOutcome::Accepted(record) => {
                    accepted += 1;
                    self.emit(record, &mut rng);
                }
                ValidationOutcome::Rejected(rejection) => {
                    trace!(
                        file = %path.display(),
                        line = source.lines_read(),
                        reason = %rejection.reason,
                        stage = rejection.stage,
                        "Rejected record"
                    );
                }
            }
        }

        self.counters.file_processed();
        debug!(
            file = %path.display(),
            lines = source.lines_read(),
            accepted,
            "Finished file"
        );
    }

    fn emit(&self, record: Record, rng: &mut StdRng) {
        match &self.candidates {
            Candidates::Streaming(sampler) => {
                if sampler.is_some_and(|s| !s.keep(rng)) {
                    self.counters.sampled_out(1);
                    return;
                }
                let position = self.next_index.fetch_add(1, Ordering::Relaxed);
                self.write(&record, position);
            }
            Candidates::Materialized(queue) => queue.push(record),
            Candidates::Reservoir(reservoir) => reservoir
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .offer(record, rng),
        }
    }

    fn write(&self, record: &Record, position: usize) -> bool {
        match self.sink.write(record, position) {
            Ok(()) => {
                self.counters.written();
                true
            }
            Err(err) if err.is_fatal() => {
                error!(error = %err, "Output failed, stopping workers");
                self.stop.store(true, Ordering::Relaxed);
                self.fatal
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert(err);
                false
            }
            Err(err) => {
                warn!(error = %err, "Dropped a record that could not be encoded");
                true
            }
        }
    }

    fn file_failed(&self, path: &Path, err: &Error) {
        warn!(file = %path.display(), error = %err, "Failed to read file");
        self.counters.file_failed();
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FileFailure {
                path: path.to_path_buf(),
                error: err.to_string(),
            });
    }

    fn take_fatal(&self) -> Option<Error> {
        self.fatal.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Runs one pipeline from enumeration to closed shards
pub struct Coordinator {
    config: PipelineConfig,
    chain: Arc<ValidatorChain>,
    factory: Arc<dyn SourceFactory>,
    counters: Arc<RunCounters>,
    state: Arc<StateMachine>,
    cancel: CancellationToken,
    run_id: Uuid,
}

impl Coordinator {
    /// Create a coordinator for a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            chain: Arc::new(build_chain(&config)),
            factory: Arc::new(ReaderFactory::new(config.input_format)),
            counters: Arc::new(RunCounters::new()),
            state: Arc::new(StateMachine::new()),
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
            config,
        })
    }

    /// Replace the validator chain built from the configuration
    #[must_use]
    pub fn with_chain(mut self, chain: ValidatorChain) -> Self {
        self.chain = Arc::new(chain);
        self
    }

    /// Replace the reader factory
    #[must_use]
    pub fn with_source_factory(mut self, factory: Arc<dyn SourceFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// A token that stops the run cooperatively when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Counters updated while the run is in flight
    pub fn counters(&self) -> Arc<RunCounters> {
        self.counters.clone()
    }

    /// The current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state.current()
    }

    /// Id attached to this run's logs and report
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The configuration being run
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute the run
    ///
    /// Returns a report for `Done` and `Cancelled` runs. Enumeration and
    /// output failures end the run in `Failed` and are returned as errors
    /// after every shard has been closed.
    pub fn run(&self) -> Result<RunReport> {
        let span = info_span!("corpus_run", run_id = %self.run_id);
        let _enter = span.enter();
        let started = Instant::now();

        let seed = match self.config.seed {
            Some(seed) => seed,
            None => {
                let seed = random_seed();
                info!(seed, "No seed configured, drew one");
                seed
            }
        };

        self.advance(PipelineState::Enumerating)?;
        let files = match self.enumerate() {
            Ok(files) => files,
            Err(err) => return Err(self.fail(None, err)),
        };
        self.counters.set_files_discovered(files.len() as u64);
        info!(files = files.len(), "Enumerated input files");

        let workers = self.config.effective_workers();
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("corpus-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(err) => return Err(self.fail(None, Error::PipelineExecution(err.to_string()))),
        };

        let sink = match ShardedSink::create(
            &self.config.output,
            self.config.effective_shards(),
            self.config.output_format,
        ) {
            Ok(sink) => sink,
            Err(err) => return Err(self.fail(None, err)),
        };

        let candidates = match self.candidates() {
            Ok(candidates) => candidates,
            Err(err) => return Err(self.fail(Some(&sink), err)),
        };

        let context = RunContext {
            chain: &self.chain,
            factory: self.factory.as_ref(),
            counters: &self.counters,
            sink: &sink,
            cancel: &self.cancel,
            seed,
            candidates,
            next_index: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            fatal: Mutex::new(None),
            failures: Mutex::new(Vec::new()),
        };

        self.advance(PipelineState::Running)?;
        info!(workers, shards = sink.shard_count(), "Processing files");
        pool.install(|| {
            use rayon::prelude::*;
            files.par_iter().enumerate().for_each(|(index, path)| {
                let _enter = span.enter();
                context.process_file(index, path);
            });
        });

        if let Some(err) = context.take_fatal() {
            return Err(self.fail(Some(&sink), err));
        }

        let mut warnings = Vec::new();

        if self.cancel.is_cancelled() {
            if let Some(discarded) = pending_candidates(&context.candidates) {
                warnings.push(format!(
                    "run cancelled before selection, {discarded} candidate records discarded"
                ));
            }
        } else if !matches!(context.candidates, Candidates::Streaming(_)) {
            self.advance(PipelineState::Draining)?;
            if let Err(err) = self.drain(&context, seed, &mut warnings) {
                return Err(self.fail(Some(&sink), err));
            }
        }

        if let Err(err) = sink.close() {
            return Err(self.fail(None, err));
        }

        let state = if self.cancel.is_cancelled() {
            PipelineState::Cancelled
        } else {
            PipelineState::Done
        };
        self.advance(state)?;

        let mut report =
            RunReport::from_snapshot(self.run_id, state, seed, self.counters.snapshot());
        report.failed_files = std::mem::take(
            &mut *context.failures.lock().unwrap_or_else(PoisonError::into_inner),
        );
        report.shard_counts = sink.shard_counts();
        report.outputs = sink.shard_paths();
        report.warnings = warnings;
        report.elapsed = started.elapsed();

        info!(
            state = %report.state,
            files = report.files_processed,
            failed = report.failed_files.len(),
            accepted = report.accepted,
            rejected = report.rejected.total(),
            written = report.written,
            elapsed_ms = report.elapsed.as_millis(),
            "Run finished"
        );
        Ok(report)
    }

    fn enumerate(&self) -> Result<Vec<PathBuf>> {
        let outputs: Vec<PathBuf> = shard_paths(&self.config.output, self.config.effective_shards())
            .iter()
            .map(|path| resolve(path))
            .collect();
        let mut files = SourceEnumerator::from_config(&self.config).enumerate()?;
        files.retain(|file| {
            let own = outputs.contains(&resolve(file));
            if own {
                debug!(file = %file.display(), "Skipping the run's own output");
            }
            !own
        });
        Ok(files)
    }

    fn candidates(&self) -> Result<Candidates> {
        let candidates = match self.config.sampling {
            SamplingPolicy::KeepAll => Candidates::Streaming(None),
            SamplingPolicy::Rate { rate } => {
                Candidates::Streaming(Some(BernoulliSampler::new(rate)?))
            }
            SamplingPolicy::Count { count } if self.config.reservoir && count > 0 => {
                Candidates::Reservoir(Mutex::new(ReservoirSampler::new(count)))
            }
            SamplingPolicy::Count { .. } | SamplingPolicy::Ratio { .. } => {
                Candidates::Materialized(SegQueue::new())
            }
        };
        Ok(candidates)
    }

    fn drain(&self, context: &RunContext<'_>, seed: u64, warnings: &mut Vec<String>) -> Result<()> {
        let mut rng = seeded_rng(seed, SELECTION_STREAM);

        let (selection, offered) = match &context.candidates {
            Candidates::Streaming(_) => return Ok(()),
            Candidates::Materialized(queue) => {
                let mut records = Vec::with_capacity(queue.len());
                while let Some(record) = queue.pop() {
                    records.push(record);
                }
                records.sort_by(|a, b| a.origin().cmp(&b.origin()).then(a.line().cmp(&b.line())));
                let offered = records.len();

                let selection = match self.config.sampling {
                    SamplingPolicy::Ratio { ratio } => {
                        RatioSampler::new(ratio)?.select(records, &mut rng)
                    }
                    SamplingPolicy::Count { count } => {
                        BoundedSampler::new(count).select(records, &mut rng)
                    }
                    SamplingPolicy::KeepAll | SamplingPolicy::Rate { .. } => Selection {
                        records,
                        shortfall: None,
                    },
                };
                (selection, offered)
            }
            Candidates::Reservoir(reservoir) => {
                let reservoir = std::mem::replace(
                    &mut *reservoir.lock().unwrap_or_else(PoisonError::into_inner),
                    ReservoirSampler::new(0),
                );
                let offered = reservoir.seen();
                (reservoir.finish(&mut rng), offered)
            }
        };

        if let Some(shortfall) = selection.shortfall {
            warn!(
                requested = shortfall.requested,
                available = shortfall.available,
                "Fewer records than requested, keeping all of them"
            );
            warnings.push(format!(
                "requested {} records but only {} were available",
                shortfall.requested, shortfall.available
            ));
        }

        let selected = selection.records.len();
        context.counters.sampled_out((offered - selected) as u64);
        info!(candidates = offered, selected, "Selected records");

        for (position, record) in selection.records.iter().enumerate() {
            if !context.write(record, position) {
                break;
            }
        }

        context.take_fatal().map_or(Ok(()), Err)
    }

    fn advance(&self, next: PipelineState) -> Result<()> {
        let previous = self.state.advance(next)?;
        info!(from = %previous, to = %next, "Pipeline state changed");
        Ok(())
    }

    /// Close the sink best-effort, enter `Failed` and hand back the error
    fn fail(&self, sink: Option<&ShardedSink>, err: Error) -> Error {
        if let Some(Err(close_err)) = sink.map(RecordSink::close) {
            warn!(error = %close_err, "Failed to close shards after a fatal error");
        }
        if let Err(state_err) = self.advance(PipelineState::Failed) {
            warn!(error = %state_err, "Could not record failure");
        }
        error!(error = %err, "Run failed");
        err
    }
}

/// Canonical spelling of `path`, resolved through its parent when the file
/// does not exist yet
fn resolve(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }

    let Some(name) = path.file_name() else {
        return path.to_path_buf();
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::canonicalize(parent).map_or_else(|_| path.to_path_buf(), |dir| dir.join(name))
}

fn pending_candidates(candidates: &Candidates) -> Option<usize> {
    match candidates {
        Candidates::Streaming(_) => None,
        Candidates::Materialized(queue) => Some(queue.len()),
        Candidates::Reservoir(reservoir) => Some(
            reservoir
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .seen(),
        ),
    }
}
