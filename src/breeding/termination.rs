use tracing::info;

use crate::breeding::Operator;
use crate::error::Result;
use crate::evolution::Deme;
use crate::gp::context::Context;
use crate::register::{ParameterValue, Register};

pub const MAX_FITNESS: &str = "ec.term.maxfitness";
pub const MAX_HITS: &str = "gp.term.maxhits";

/// Requests termination once an individual reaches the target fitness or
/// the target number of hits.
#[derive(Debug, Clone)]
pub struct TerminationOp {
    max_fitness: f64,
    max_hits: usize,
}

impl TerminationOp {
    pub fn new() -> Self {
        Self {
            max_fitness: f64::INFINITY,
            max_hits: 0,
        }
    }
}

impl Default for TerminationOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for TerminationOp {
    fn name(&self) -> &str {
        "TerminationOp"
    }

    fn initialize(&mut self, register: &mut Register) -> Result<()> {
        register.declare(
            MAX_FITNESS,
            ParameterValue::Float(f64::INFINITY),
            "fitness at which the evolution stops (inf = never)",
        );
        register.declare(
            MAX_HITS,
            ParameterValue::Int(0),
            "hits at which the evolution stops (0 = never)",
        );
        self.max_fitness = register.float(MAX_FITNESS)?;
        self.max_hits = register.uint(MAX_HITS)?;
        Ok(())
    }

    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()> {
        let reached = deme.population.iter().find(|individual| {
            individual.fitness.is_valid()
                && (individual.fitness.score() >= self.max_fitness
                    || (self.max_hits > 0 && individual.fitness.hits() >= self.max_hits))
        });
        if let Some(individual) = reached {
            info!(
                generation = context.generation(),
                deme = context.deme_index(),
                fitness = %individual.fitness,
                "termination criterion reached"
            );
            context.request_termination();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::Fitness;
    use crate::gp::{Individual, PrimitiveSuperSet, Tree};

    fn scored(fitness: Fitness) -> Individual {
        let mut individual = Individual::with_trees(vec![Tree::new(0, 0)]);
        individual.fitness = fitness;
        individual
    }

    fn run(register_values: &[(&str, ParameterValue)], population: Vec<Individual>) -> bool {
        let mut context = Context::with_seed(PrimitiveSuperSet::new(), 1);
        for (name, value) in register_values {
            context.register.set(name, value.clone());
        }
        let mut op = TerminationOp::new();
        op.initialize(&mut context.register).unwrap();
        let mut deme = Deme::with_population(population);
        op.operate(&mut deme, &mut context).unwrap();
        context.is_termination_requested()
    }

    #[test]
    fn test_defaults_never_terminate() {
        assert!(!run(&[], vec![scored(Fitness::with_hits(1.0e300, 1000))]));
    }

    #[test]
    fn test_fitness_target() {
        let target = [(MAX_FITNESS, ParameterValue::Float(0.99))];
        assert!(!run(&target, vec![scored(Fitness::new(0.5)), scored(Fitness::invalid())]));
        assert!(run(&target, vec![scored(Fitness::new(0.5)), scored(Fitness::new(1.0))]));
    }

    #[test]
    fn test_hits_target() {
        let target = [(MAX_HITS, ParameterValue::Int(20))];
        assert!(!run(&target, vec![scored(Fitness::with_hits(0.2, 19))]));
        assert!(run(&target, vec![scored(Fitness::with_hits(0.2, 20))]));
    }
}
