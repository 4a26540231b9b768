use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::breeding::Operator;
use crate::error::{BeagleError, Result};
use crate::evolution::{Deme, Evaluator};
use crate::fitness::Fitness;
use crate::gp::context::{Context, ExecutionLimits};
use crate::gp::individual::Individual;
use crate::register::{ParameterValue, Register};

pub const PARALLEL_THRESHOLD: &str = "ec.eval.parallel";

/// Evaluates every individual whose fitness is invalid.
///
/// Individuals that exhaust their execution budget get the evaluator's
/// fallback fitness instead of aborting the run. Above `ec.eval.parallel`
/// pending individuals the work is spread over the rayon pool.
pub struct EvaluationOp {
    evaluator: Arc<dyn Evaluator>,
    parallel_threshold: usize,
}

impl EvaluationOp {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            parallel_threshold: 1000,
        }
    }

    fn evaluate_one(
        evaluator: &dyn Evaluator,
        individual: &Individual,
        context: &Context,
    ) -> Result<Fitness> {
        let fitness = match evaluator.evaluate(individual, context) {
            Ok(fitness) => fitness,
            Err(err) if err.is_resources_exceeded() => {
                trace!(%err, "evaluation exhausted its budget");
                evaluator.exhausted_fitness()
            }
            Err(err) => return Err(err),
        };
        match fitness.value() {
            Some(value) if !value.is_finite() => Err(BeagleError::Execution(format!(
                "non-finite fitness {} for individual {}",
                value, individual
            ))),
            _ => Ok(fitness),
        }
    }
}

impl fmt::Debug for EvaluationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationOp")
            .field("parallel_threshold", &self.parallel_threshold)
            .finish_non_exhaustive()
    }
}

impl Operator for EvaluationOp {
    fn name(&self) -> &str {
        "EvaluationOp"
    }

    fn initialize(&mut self, register: &mut Register) -> Result<()> {
        register.declare(
            PARALLEL_THRESHOLD,
            ParameterValue::Int(1000),
            "pending individuals from which evaluation runs in parallel",
        );
        ExecutionLimits::declare(register);
        self.parallel_threshold = register.uint(PARALLEL_THRESHOLD)?;
        Ok(())
    }

    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()> {
        let pending: Vec<usize> = deme
            .population
            .iter()
            .enumerate()
            .filter(|(_, individual)| !individual.fitness.is_valid())
            .map(|(index, _)| index)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let evaluator = self.evaluator.as_ref();
        let shared: &Context = context;
        let population = &deme.population;
        let evaluated: Vec<(usize, Fitness)> = if pending.len() >= self.parallel_threshold {
            pending
                .par_iter()
                .map(|&index| {
                    Self::evaluate_one(evaluator, &population[index], shared)
                        .map(|fitness| (index, fitness))
                })
                .collect::<Result<_>>()?
        } else {
            pending
                .iter()
                .map(|&index| {
                    Self::evaluate_one(evaluator, &population[index], shared)
                        .map(|fitness| (index, fitness))
                })
                .collect::<Result<_>>()?
        };

        debug!(
            operator = self.name(),
            deme = context.deme_index(),
            evaluated = evaluated.len(),
            "evaluation done"
        );
        for (index, fitness) in evaluated {
            deme.population[index].fitness = fitness;
        }
        Ok(())
    }
}
