//! # RandomNumberGenerator
//!
//! The `RandomNumberGenerator` struct wraps a seedable `StdRng` and offers the
//! handful of draws the operators need: integers in a closed range, uniform
//! floats, fair and biased coins, and weighted indices.
//!
//! ## Example
//!
//! ```rust
//! use beagle::rng::RandomNumberGenerator;
//!
//! let mut rng = RandomNumberGenerator::from_seed(7);
//! let depth = rng.roll_integer(2, 5);
//! assert!((2..=5).contains(&depth));
//! ```

use rand::{
    distributions::{Distribution, WeightedIndex},
    rngs::StdRng,
    Rng, SeedableRng,
};

/// A wrapper around the `rand` crate's `StdRng`.
#[derive(Clone, Debug)]
pub struct RandomNumberGenerator {
    pub rng: StdRng,
}

impl RandomNumberGenerator {
    /// Creates a new `RandomNumberGenerator` instance seeded from the system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a new `RandomNumberGenerator` instance with a specific seed.
    ///
    /// This is useful for reproducible tests and benchmarks.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Replaces the internal state with one derived from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Returns an integer uniformly drawn from `[low, high]` (both inclusive).
    ///
    /// The bounds are swapped when given in the wrong order.
    pub fn roll_integer(&mut self, low: usize, high: usize) -> usize {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        self.rng.gen_range(low..=high)
    }

    /// Returns an index uniformly drawn from `[0, len)`.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    pub fn roll_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Returns a float uniformly drawn from `[low, high)`.
    pub fn roll_uniform(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    /// Returns `true` with probability `probability` (clamped to `[0, 1]`).
    pub fn flip(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    /// Fair coin.
    pub fn coin(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    /// Draws an index with probability proportional to its weight.
    ///
    /// Returns `None` when `weights` is empty, contains a negative or
    /// non-finite weight, or sums to zero.
    pub fn roll_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let distribution = WeightedIndex::new(weights).ok()?;
        Some(distribution.sample(&mut self.rng))
    }

    /// Shuffles `items` in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        use rand::seq::SliceRandom;
        items.shuffle(&mut self.rng);
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}
