//! # Fitness
//!
//! Fitness values are maximized. A fitness is created invalid and becomes
//! valid once an evaluator assigns it; structural operators invalidate it
//! again. Problems in the Koza tradition can also record the number of hits
//! (fitness cases solved), which the termination operator can target.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fitness {
    value: Option<f64>,
    #[serde(default)]
    hits: usize,
}

impl Fitness {
    /// A fitness that has not been evaluated yet.
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn new(value: f64) -> Self {
        Self {
            value: Some(value),
            hits: 0,
        }
    }

    pub fn with_hits(value: f64, hits: usize) -> Self {
        Self {
            value: Some(value),
            hits,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// The value used for comparisons; invalid or NaN fitness ranks lowest.
    pub fn score(&self) -> f64 {
        match self.value {
            Some(value) if !value.is_nan() => value,
            _ => f64::NEG_INFINITY,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn invalidate(&mut self) {
        self.value = None;
        self.hits = 0;
    }

    /// Total order on scores, higher is better.
    pub fn compare(&self, other: &Fitness) -> Ordering {
        self.score()
            .partial_cmp(&other.score())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) if self.hits > 0 => write!(f, "{:.6} ({} hits)", value, self.hits),
            Some(value) => write!(f, "{:.6}", value),
            None => write!(f, "invalid"),
        }
    }
}
