use serde::{Deserialize, Serialize};
use tracing::info;

use crate::breeding::Operator;
use crate::error::Result;
use crate::evolution::Deme;
use crate::gp::context::Context;
use crate::gp::individual::Individual;
use crate::register::Register;

/// Summary of a population at one generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub generation: usize,
    pub population: usize,
    /// Individuals with a valid fitness; the fitness figures cover only them.
    pub evaluated: usize,
    pub best: f64,
    pub worst: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub best_hits: usize,
    pub mean_size: f64,
    pub max_depth: usize,
}

impl Stats {
    pub fn compute<'a, I>(generation: usize, population: I) -> Self
    where
        I: IntoIterator<Item = &'a Individual>,
    {
        let mut stats = Stats {
            generation,
            ..Stats::default()
        };
        let mut total_size = 0usize;
        let mut scores = Vec::new();
        for individual in population {
            stats.population += 1;
            total_size += individual.size();
            stats.max_depth = stats.max_depth.max(individual.depth());
            if let Some(value) = individual.fitness.value() {
                if scores.is_empty() || value > stats.best {
                    stats.best = value;
                    stats.best_hits = individual.fitness.hits();
                }
                scores.push(value);
            }
        }
        if stats.population > 0 {
            stats.mean_size = total_size as f64 / stats.population as f64;
        }
        if !scores.is_empty() {
            let n = scores.len() as f64;
            stats.evaluated = scores.len();
            stats.worst = scores.iter().copied().fold(f64::INFINITY, f64::min);
            stats.mean = scores.iter().sum::<f64>() / n;
            let variance = scores
                .iter()
                .map(|score| (score - stats.mean).powi(2))
                .sum::<f64>()
                / n;
            stats.std_dev = variance.sqrt();
        }
        stats
    }
}

/// Computes the deme statistics and logs them.
#[derive(Debug, Clone, Default)]
pub struct StatsCalcOp;

impl StatsCalcOp {
    pub fn new() -> Self {
        Self
    }
}

impl Operator for StatsCalcOp {
    fn name(&self) -> &str {
        "StatsCalcOp"
    }

    fn initialize(&mut self, _register: &mut Register) -> Result<()> {
        Ok(())
    }

    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()> {
        let stats = Stats::compute(context.generation(), &deme.population);
        info!(
            generation = stats.generation,
            deme = context.deme_index(),
            best = stats.best,
            mean = stats.mean,
            worst = stats.worst,
            best_hits = stats.best_hits,
            mean_size = stats.mean_size,
            "deme statistics"
        );
        deme.stats = Some(stats);
        Ok(())
    }
}
