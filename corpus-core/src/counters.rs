//! Shared run counters
//!
//! One [`RunCounters`] is created per run and handed to every worker. It is
//! only ever mutated through atomic increments, so progress can be read from
//! another thread while the run is in flight.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::record::{RejectReason, ValidationOutcome};

/// Atomic counters shared by every worker of a run
#[derive(Debug, Default)]
pub struct RunCounters {
    files_discovered: AtomicU64,
    files_processed: AtomicU64,
    files_failed: AtomicU64,
    records_read: AtomicU64,
    accepted: AtomicU64,
    sampled_out: AtomicU64,
    written: AtomicU64,
    rejected: [AtomicU64; 4],
}

impl RunCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how many files enumeration found
    pub fn set_files_discovered(&self, count: u64) {
        self.files_discovered.store(count, Ordering::Relaxed);
    }

    /// A file finished, successfully or not
    pub fn file_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A file could not be read to the end
    pub fn file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count the outcome of reading and validating one record
    pub fn record(&self, outcome: &ValidationOutcome) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
        match outcome.reason() {
            None => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
            }
            Some(reason) => {
                self.rejected[reason.index()].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// `count` accepted records were dropped by sampling
    pub fn sampled_out(&self, count: u64) {
        self.sampled_out.fetch_add(count, Ordering::Relaxed);
    }

    /// A record reached an output shard
    pub fn written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    /// Files discovered so far
    pub fn files_discovered(&self) -> u64 {
        self.files_discovered.load(Ordering::Relaxed)
    }

    /// Files finished so far
    pub fn files_processed(&self) -> u64 {
        self.files_processed.load(Ordering::Relaxed)
    }

    /// Rejections for one reason so far
    pub fn rejected(&self, reason: RejectReason) -> u64 {
        self.rejected[reason.index()].load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            files_discovered: self.files_discovered(),
            files_processed: self.files_processed(),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            records_read: self.records_read.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            sampled_out: self.sampled_out.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            rejected: RejectionCounts {
                malformed: self.rejected(RejectReason::Malformed),
                content_quality: self.rejected(RejectReason::ContentQuality),
                schema: self.rejected(RejectReason::Schema),
                length: self.rejected(RejectReason::Length),
            },
        }
    }
}

/// Rejections broken down by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    /// Lines that could not be decoded
    pub malformed: u64,

    /// Garbled text or wrong script
    pub content_quality: u64,

    /// Wrong record shape
    pub schema: u64,

    /// Length or size out of bounds
    pub length: u64,
}

impl RejectionCounts {
    /// Count for one reason
    pub fn get(&self, reason: RejectReason) -> u64 {
        match reason {
            RejectReason::Malformed => self.malformed,
            RejectReason::ContentQuality => self.content_quality,
            RejectReason::Schema => self.schema,
            RejectReason::Length => self.length,
        }
    }

    /// Rejections of every reason
    pub fn total(&self) -> u64 {
        self.malformed + self.content_quality + self.schema + self.length
    }
}

/// Plain copy of [`RunCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Files found by enumeration
    pub files_discovered: u64,

    /// Files finished, including failed ones
    pub files_processed: u64,

    /// Files that could not be read to the end
    pub files_failed: u64,

    /// Records read, accepted or not
    pub records_read: u64,

    /// Records that passed the validator chain
    pub accepted: u64,

    /// Accepted records dropped by sampling
    pub sampled_out: u64,

    /// Records written to a shard
    pub written: u64,

    /// Rejections by reason
    pub rejected: RejectionCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, Rejection};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_increments() {
        let counters = Arc::new(RunCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = counters.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record(&ValidationOutcome::Accepted(Record::text("x")));
                        counters.record(&ValidationOutcome::Rejected(Rejection::new(
                            RejectReason::Schema,
                            "test",
                        )));
                    }
                    counters.file_processed();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.records_read, 16_000);
        assert_eq!(snapshot.accepted, 8_000);
        assert_eq!(snapshot.rejected.schema, 8_000);
        assert_eq!(snapshot.rejected.total(), 8_000);
        assert_eq!(snapshot.files_processed, 8);
    }

    #[test]
    fn test_rejection_counts_get() {
        let counts = RejectionCounts {
            malformed: 1,
            content_quality: 2,
            schema: 3,
            length: 4,
        };
        for (reason, expected) in RejectReason::ALL.iter().zip(1..) {
            assert_eq!(counts.get(*reason), expected);
        }
        assert_eq!(counts.total(), 10);
    }
}
