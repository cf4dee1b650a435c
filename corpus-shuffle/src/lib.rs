//! Seeded sampling, shuffling and shard partitioning
//!
//! Every sampler takes its random source as an argument, so a run can derive
//! one generator per file from a single seed with [`seeded_rng`] and replay
//! the same decisions later.

pub mod partition;
pub mod reservoir;
pub mod sampler;

pub use partition::{partition, RoundRobin};
pub use reservoir::ReservoirSampler;
pub use sampler::{BernoulliSampler, BoundedSampler, RatioSampler, Selection, Shortfall};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// A deterministic generator for one stream of a seeded run
///
/// Different `stream` values under the same seed give independent sequences.
pub fn seeded_rng(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Draw a fresh seed from the operating system
pub fn random_seed() -> u64 {
    rand::random()
}
