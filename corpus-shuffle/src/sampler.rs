//! Bernoulli, bounded-count and ratio sampling

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

use corpus_core::{Error, Result};

/// More records were requested than were available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    /// Number of records asked for
    pub requested: usize,

    /// Number of records that existed
    pub available: usize,
}

/// Records chosen by a sampler, in output order
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<T> {
    /// The chosen records, shuffled
    pub records: Vec<T>,

    /// Set when fewer records existed than were requested
    pub shortfall: Option<Shortfall>,
}

impl<T> Selection<T> {
    fn complete(records: Vec<T>) -> Self {
        Self {
            records,
            shortfall: None,
        }
    }
}

/// Keeps each record independently with a fixed probability
#[derive(Debug, Clone, Copy)]
pub struct BernoulliSampler {
    rate: f64,
}

impl BernoulliSampler {
    /// Create a sampler keeping records with probability `rate`
    pub fn new(rate: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::InvalidArgument(format!(
                "sample rate must be within [0, 1], got {rate}"
            )));
        }
        Ok(Self { rate })
    }

    /// The keep probability
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Decide whether to keep the next record
    pub fn keep<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.rate)
    }
}

/// Picks a fixed number of records uniformly without replacement
///
/// A count of zero keeps every record. The selection is always shuffled, so
/// output order never follows input order.
#[derive(Debug, Clone, Copy)]
pub struct BoundedSampler {
    count: usize,
}

impl BoundedSampler {
    /// Create a sampler selecting `count` records (0 keeps all)
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    /// Select from a fully materialized candidate set
    pub fn select<T, R: Rng + ?Sized>(&self, mut items: Vec<T>, rng: &mut R) -> Selection<T> {
        if self.count == 0 {
            items.shuffle(rng);
            return Selection::complete(items);
        }

        let available = items.len();
        let amount = self.count.min(available);

        let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
        let mut records: Vec<T> = index::sample(rng, available, amount)
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();
        records.shuffle(rng);

        Selection {
            records,
            shortfall: (self.count > available).then_some(Shortfall {
                requested: self.count,
                available,
            }),
        }
    }
}

/// Shuffles and keeps `floor(len * ratio)` records
#[derive(Debug, Clone, Copy)]
pub struct RatioSampler {
    ratio: f64,
}

impl RatioSampler {
    /// Create a sampler keeping the given fraction of records
    pub fn new(ratio: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(Error::InvalidArgument(format!(
                "sample ratio must be within [0, 1], got {ratio}"
            )));
        }
        Ok(Self { ratio })
    }

    /// Number of records kept out of `len`
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn target(&self, len: usize) -> usize {
        ((len as f64 * self.ratio).floor() as usize).min(len)
    }

    /// Select from a fully materialized candidate set
    pub fn select<T, R: Rng + ?Sized>(&self, mut items: Vec<T>, rng: &mut R) -> Selection<T> {
        items.shuffle(rng);
        items.truncate(self.target(items.len()));
        Selection::complete(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeded_rng;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test]
    fn test_bernoulli_rate_converges() {
        let sampler = BernoulliSampler::new(0.3).unwrap();
        let mut rng = seeded_rng(7, 0);

        let trials = 100_000;
        let kept = (0..trials).filter(|_| sampler.keep(&mut rng)).count();
        let observed = kept as f64 / f64::from(trials);
        assert!((observed - 0.3).abs() < 0.02, "observed rate {observed}");
    }

    #[test]
    fn test_bernoulli_extremes() {
        let mut rng = seeded_rng(1, 0);
        let never = BernoulliSampler::new(0.0).unwrap();
        let always = BernoulliSampler::new(1.0).unwrap();
        assert!((0..1000).all(|_| !never.keep(&mut rng)));
        assert!((0..1000).all(|_| always.keep(&mut rng)));
    }

    #[test_case(-0.01 ; "negative")]
    #[test_case(1.01 ; "above one")]
    #[test_case(f64::NAN ; "nan")]
    fn test_out_of_range_rates(rate: f64) {
        assert!(BernoulliSampler::new(rate).is_err());
        assert!(RatioSampler::new(rate).is_err());
    }

    #[test]
    fn test_bounded_shortfall() {
        let selection = BoundedSampler::new(5).select(vec![1, 2, 3], &mut seeded_rng(3, 0));
        let mut records = selection.records.clone();
        records.sort_unstable();
        assert_eq!(records, vec![1, 2, 3]);
        assert_eq!(
            selection.shortfall,
            Some(Shortfall {
                requested: 5,
                available: 3
            })
        );
    }

    #[test]
    fn test_bounded_selects_distinct_subset() {
        let input: Vec<u32> = (0..100).collect();
        let selection = BoundedSampler::new(10).select(input, &mut seeded_rng(11, 0));

        assert_eq!(selection.records.len(), 10);
        assert!(selection.shortfall.is_none());
        let distinct: HashSet<_> = selection.records.iter().collect();
        assert_eq!(distinct.len(), 10);
    }

    #[test]
    fn test_zero_count_keeps_all_shuffled() {
        let input: Vec<u32> = (0..200).collect();
        let selection = BoundedSampler::new(0).select(input.clone(), &mut seeded_rng(5, 0));

        assert_ne!(selection.records, input);
        let mut sorted = selection.records;
        sorted.sort_unstable();
        assert_eq!(sorted, input);
    }

    #[test]
    fn test_same_seed_same_selection() {
        let input: Vec<u32> = (0..1000).collect();
        let first = BoundedSampler::new(50).select(input.clone(), &mut seeded_rng(42, 0));
        let second = BoundedSampler::new(50).select(input, &mut seeded_rng(42, 0));
        assert_eq!(first, second);
    }

    #[test_case(10, 0.35, 3)]
    #[test_case(10, 1.0, 10)]
    #[test_case(10, 0.0, 0)]
    #[test_case(0, 0.5, 0)]
    fn test_ratio_target(len: usize, ratio: f64, expected: usize) {
        let sampler = RatioSampler::new(ratio).unwrap();
        assert_eq!(sampler.target(len), expected);

        let input: Vec<usize> = (0..len).collect();
        let selection = sampler.select(input, &mut seeded_rng(9, 0));
        assert_eq!(selection.records.len(), expected);
    }
}
