use tracing::debug;

use crate::breeding::Operator;
use crate::error::Result;
use crate::evolution::Deme;
use crate::fitness::Fitness;
use crate::gp::context::Context;
use crate::register::{ParameterValue, Register};
use crate::selection::{SelectionStrategy, TournamentSelection};

pub const TOURNAMENT_SIZE: &str = "ec.sel.tournsize";

/// Replaces the population by tournament winners, drawn with replacement.
#[derive(Debug, Clone)]
pub struct SelectTournamentOp {
    selection: TournamentSelection,
}

impl SelectTournamentOp {
    pub fn new() -> Self {
        Self {
            selection: TournamentSelection::default().with_duplicates(),
        }
    }
}

impl Default for SelectTournamentOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for SelectTournamentOp {
    fn name(&self) -> &str {
        "SelectTournamentOp"
    }

    fn initialize(&mut self, register: &mut Register) -> Result<()> {
        register.declare(
            TOURNAMENT_SIZE,
            ParameterValue::Int(2),
            "number of participants in each selection tournament",
        );
        self.selection = TournamentSelection::new(register.uint(TOURNAMENT_SIZE)?)?.with_duplicates();
        Ok(())
    }

    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()> {
        if deme.population.is_empty() {
            return Ok(());
        }
        let fitness: Vec<Fitness> = deme.population.iter().map(|i| i.fitness).collect();
        let winners = self
            .selection
            .select(&fitness, deme.population.len(), &mut context.rng)?;
        deme.population = winners
            .into_iter()
            .map(|index| deme.population[index].clone())
            .collect();
        debug!(
            operator = self.name(),
            tournament_size = self.selection.tournament_size(),
            "selection done"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::{Individual, PrimitiveSuperSet, Tree};

    fn scored(value: f64) -> Individual {
        let mut individual = Individual::with_trees(vec![Tree::new(0, 0)]);
        individual.fitness = Fitness::new(value);
        individual
    }

    #[test]
    fn test_selection_keeps_size_and_favours_fitter() {
        let mut context = Context::with_seed(PrimitiveSuperSet::new(), 5);
        context.register.set(TOURNAMENT_SIZE, ParameterValue::Int(30));
        let mut op = SelectTournamentOp::new();
        op.initialize(&mut context.register).unwrap();

        let mut deme = Deme::with_population(vec![scored(1.0), scored(9.0), scored(3.0)]);
        op.operate(&mut deme, &mut context).unwrap();

        assert_eq!(deme.population.len(), 3);
        assert!(deme
            .population
            .iter()
            .all(|individual| individual.fitness.score() == 9.0));
    }

    #[test]
    fn test_empty_deme_is_left_alone() {
        let mut context = Context::with_seed(PrimitiveSuperSet::new(), 5);
        let mut op = SelectTournamentOp::new();
        op.initialize(&mut context.register).unwrap();
        let mut deme = Deme::new();
        op.operate(&mut deme, &mut context).unwrap();
        assert!(deme.population.is_empty());
    }
}
