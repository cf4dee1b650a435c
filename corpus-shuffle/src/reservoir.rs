//! Single-pass bounded sampling

use rand::seq::SliceRandom;
use rand::Rng;

use crate::sampler::{Selection, Shortfall};

/// Uniform fixed-size sample over a stream of unknown length
///
/// Holds at most `capacity` items. After `n` offers each item has been kept
/// with probability `capacity / n`.
#[derive(Debug, Clone)]
pub struct ReservoirSampler<T> {
    capacity: usize,
    seen: usize,
    items: Vec<T>,
}

impl<T> ReservoirSampler<T> {
    /// Create a reservoir keeping `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: 0,
            items: Vec::with_capacity(capacity.min(1 << 16)),
        }
    }

    /// Number of items offered so far
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Offer the next item of the stream
    pub fn offer<R: Rng + ?Sized>(&mut self, item: T, rng: &mut R) {
        self.seen += 1;

        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }

        let slot = rng.gen_range(0..self.seen);
        if slot < self.capacity {
            self.items[slot] = item;
        }
    }

    /// Shuffle the kept items and report a shortfall if the stream was short
    pub fn finish<R: Rng + ?Sized>(mut self, rng: &mut R) -> Selection<T> {
        self.items.shuffle(rng);

        Selection {
            records: self.items,
            shortfall: (self.seen < self.capacity).then_some(Shortfall {
                requested: self.capacity,
                available: self.seen,
            }),
        }
    }
}
