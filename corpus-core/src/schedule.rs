//! Pipeline lifecycle and run reporting

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::counters::{CounterSnapshot, RejectionCounts};
use crate::error::{Error, Result};

/// Lifecycle of a pipeline run
///
/// `Idle -> Enumerating -> Running -> [Draining] -> Done | Failed | Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineState {
    /// Not started
    Idle,
    /// Discovering input files
    Enumerating,
    /// Workers are processing files
    Running,
    /// Selecting from the materialized candidate set
    Draining,
    /// Every shard flushed and closed
    Done,
    /// A fatal error ended the run
    Failed,
    /// Stopped early on request; shards are still complete and closed
    Cancelled,
}

impl PipelineState {
    const ALL: [PipelineState; 7] = [
        PipelineState::Idle,
        PipelineState::Enumerating,
        PipelineState::Running,
        PipelineState::Draining,
        PipelineState::Done,
        PipelineState::Failed,
        PipelineState::Cancelled,
    ];

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Failed | PipelineState::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::{Cancelled, Done, Draining, Enumerating, Failed, Idle, Running};

        matches!(
            (self, next),
            (Idle, Enumerating)
                | (Enumerating, Running | Failed | Cancelled)
                | (Running, Draining | Done | Failed | Cancelled)
                | (Draining, Done | Failed | Cancelled)
        )
    }

    fn to_u8(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Enumerating => 1,
            PipelineState::Running => 2,
            PipelineState::Draining => 3,
            PipelineState::Done => 4,
            PipelineState::Failed => 5,
            PipelineState::Cancelled => 6,
        }
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL[usize::from(value).min(Self::ALL.len() - 1)]
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Enumerating => "enumerating",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
            PipelineState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The current state of a run, readable from any thread
#[derive(Debug)]
pub struct StateMachine {
    state: AtomicU8,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Start in [`PipelineState::Idle`]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PipelineState::Idle.to_u8()),
        }
    }

    /// The current state
    pub fn current(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move to `next`, failing if the transition is illegal
    pub fn advance(&self, next: PipelineState) -> Result<PipelineState> {
        let current = self.current();
        if !current.can_advance_to(next) {
            return Err(Error::PipelineExecution(format!(
                "illegal transition from {current} to {next}"
            )));
        }

        self.state
            .compare_exchange(current.to_u8(), next.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| current)
            .map_err(|actual| {
                Error::PipelineExecution(format!(
                    "state changed concurrently to {}",
                    PipelineState::from_u8(actual)
                ))
            })
    }
}

/// A file that could not be read to the end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// The file
    pub path: PathBuf,

    /// What went wrong
    pub error: String,
}

/// What a run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of the run, also attached to its log span
    pub run_id: Uuid,

    /// Terminal state
    pub state: PipelineState,

    /// Seed used for every random decision
    pub seed: u64,

    /// Files found by enumeration
    pub files_discovered: u64,

    /// Files finished, including failed ones
    pub files_processed: u64,

    /// Files that could not be read to the end
    pub failed_files: Vec<FileFailure>,

    /// Records read, accepted or not
    pub records_read: u64,

    /// Records that passed the validator chain
    pub accepted: u64,

    /// Rejections by reason
    pub rejected: RejectionCounts,

    /// Accepted records dropped by sampling
    pub sampled_out: u64,

    /// Records written across all shards
    pub written: u64,

    /// Records written per shard
    pub shard_counts: Vec<u64>,

    /// Output destinations, one per shard
    pub outputs: Vec<PathBuf>,

    /// Non-fatal conditions worth surfacing
    pub warnings: Vec<String>,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// Build a report from the final counter values
    pub fn from_snapshot(
        run_id: Uuid,
        state: PipelineState,
        seed: u64,
        snapshot: CounterSnapshot,
    ) -> Self {
        Self {
            run_id,
            state,
            seed,
            files_discovered: snapshot.files_discovered,
            files_processed: snapshot.files_processed,
            failed_files: Vec::new(),
            records_read: snapshot.records_read,
            accepted: snapshot.accepted,
            rejected: snapshot.rejected,
            sampled_out: snapshot.sampled_out,
            written: snapshot.written,
            shard_counts: Vec::new(),
            outputs: Vec::new(),
            warnings: Vec::new(),
            elapsed: Duration::default(),
        }
    }

    /// Whether the run stopped early on request
    pub fn is_cancelled(&self) -> bool {
        self.state == PipelineState::Cancelled
    }
}
