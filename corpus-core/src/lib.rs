//! Core traits, record model and configuration for the corpus pipeline
//!
//! This crate defines what flows through the pipeline (records and their
//! validation outcomes), the seams the other crates plug into (stages,
//! sources, sinks) and the shared run state (configuration, counters,
//! lifecycle).

#![warn(missing_docs)]

pub mod config;
pub mod counters;
pub mod error;
pub mod record;
pub mod schedule;
pub mod sink;
pub mod source;
pub mod transform;

// Re-export key types for convenience
pub use config::{
    Conversion, DialogueRoles, InputFormat, LengthBounds, OutputFormat, PipelineConfig,
    SamplingPolicy, SchemaMode,
};
pub use counters::{CounterSnapshot, RejectionCounts, RunCounters};
pub use error::{Error, Result};
pub use record::{LengthSource, Record, RecordBody, RejectReason, Rejection, ValidationOutcome};
pub use sink::RecordSink;
pub use source::{RecordSource, SourceFactory};
pub use transform::{Stage, ValidatorChain};

/// Pipeline lifecycle and reporting
pub mod pipeline {
    pub use crate::schedule::FileFailure;
    pub use crate::schedule::PipelineState;
    pub use crate::schedule::RunReport;
    pub use crate::schedule::StateMachine;
}
