use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BeagleError, Result};
use crate::fitness::Fitness;
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::SelectionStrategy;

/// A selection strategy that selects individuals through tournament selection.
///
/// Tournament selection works by randomly selecting a small group of individuals
/// (the tournament size) and then choosing the best one from that group. This process
/// is repeated until the desired number of individuals are selected.
///
/// Tournament selection provides a balance between exploration and exploitation:
/// - Smaller tournament sizes lead to more exploration (more random selection)
/// - Larger tournament sizes lead to more exploitation (more focus on the best individuals)
///
/// Invalid fitness ranks below every valid one.
///
/// # Examples
///
/// ```
/// use beagle::fitness::Fitness;
/// use beagle::rng::RandomNumberGenerator;
/// use beagle::selection::{SelectionStrategy, TournamentSelection};
/// use beagle::error::Result;
///
/// fn main() -> Result<()> {
///     let fitness: Vec<Fitness> = [0.5, 0.8, 0.3, 0.9, 0.1]
///         .iter()
///         .map(|&value| Fitness::new(value))
///         .collect();
///     let mut rng = RandomNumberGenerator::from_seed(1);
///
///     let selection = TournamentSelection::new(3)?.with_duplicates();
///     let selected = selection.select(&fitness, 5, &mut rng)?;
///
///     assert_eq!(selected.len(), 5);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentSelection {
    tournament_size: usize,
    allow_duplicates: bool,
}

impl TournamentSelection {
    /// Creates a new TournamentSelection strategy with the specified tournament size.
    ///
    /// By default, duplicates are not allowed in the selected individuals.
    ///
    /// # Arguments
    ///
    /// * `tournament_size` - The number of individuals that participate in each tournament.
    ///   Must be at least 1. A tournament size of 1 is equivalent to random selection.
    ///
    /// # Errors
    ///
    /// Returns an error if `tournament_size` is 0.
    pub fn new(tournament_size: usize) -> Result<Self> {
        if tournament_size < 1 {
            return Err(BeagleError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            tournament_size,
            allow_duplicates: false,
        })
    }

    pub fn with_tournament_size(mut self, tournament_size: usize) -> Result<Self> {
        if tournament_size < 1 {
            return Err(BeagleError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }
        self.tournament_size = tournament_size;
        Ok(self)
    }

    pub fn with_duplicates(mut self) -> Self {
        self.allow_duplicates = true;
        self
    }

    pub fn tournament_size(&self) -> usize {
        self.tournament_size
    }

    /// Runs a single tournament and returns the index of the winner.
    ///
    /// Participants are drawn with replacement among the individuals not in
    /// `excluded`; ties go to the first participant drawn.
    ///
    /// # Errors
    ///
    /// Returns an error if all individuals are excluded.
    fn run_tournament(
        &self,
        fitness: &[Fitness],
        rng: &mut RandomNumberGenerator,
        excluded: &HashSet<usize>,
    ) -> Result<usize> {
        let eligible: Vec<usize> = (0..fitness.len())
            .filter(|i| !excluded.contains(i))
            .collect();

        if eligible.is_empty() {
            return Err(BeagleError::Configuration(
                "No eligible individuals for tournament selection".to_string(),
            ));
        }

        let mut best_idx = eligible[rng.roll_index(eligible.len())];
        for _ in 1..self.tournament_size {
            let idx = eligible[rng.roll_index(eligible.len())];
            if fitness[idx].score() > fitness[best_idx].score() {
                best_idx = idx;
            }
        }

        Ok(best_idx)
    }
}

impl Default for TournamentSelection {
    fn default() -> Self {
        Self {
            tournament_size: 2,
            allow_duplicates: false,
        }
    }
}

impl SelectionStrategy for TournamentSelection {
    fn select(
        &self,
        fitness: &[Fitness],
        num_to_select: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<usize>> {
        if fitness.is_empty() {
            return Err(BeagleError::EmptyPopulation);
        }

        let mut selected = Vec::with_capacity(num_to_select);
        let mut selected_indices = HashSet::new();
        let no_exclusion = HashSet::new();

        while selected.len() < num_to_select {
            if self.allow_duplicates {
                selected.push(self.run_tournament(fitness, rng, &no_exclusion)?);
                continue;
            }
            if selected_indices.len() >= fitness.len() {
                break;
            }
            let winner_idx = self.run_tournament(fitness, rng, &selected_indices)?;
            selected_indices.insert(winner_idx);
            selected.push(winner_idx);
        }

        Ok(selected)
    }
}
