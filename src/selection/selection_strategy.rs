use std::fmt::Debug;

use crate::error::Result;
use crate::fitness::Fitness;
use crate::rng::RandomNumberGenerator;

/// Trait for selection strategies.
///
/// A selection strategy looks at the fitness of every individual of a
/// population and returns the indices of the chosen ones. Working on indices
/// lets the caller decide whether the winners are cloned, moved or merely
/// inspected.
///
/// # Examples
///
/// ```
/// use beagle::fitness::Fitness;
/// use beagle::rng::RandomNumberGenerator;
/// use beagle::selection::{SelectionStrategy, TournamentSelection};
///
/// let fitness = vec![Fitness::new(0.5), Fitness::new(0.8), Fitness::invalid()];
/// let mut rng = RandomNumberGenerator::from_seed(7);
///
/// let selection = TournamentSelection::default();
/// let selected = selection.select(&fitness, 2, &mut rng).unwrap();
///
/// assert_eq!(selected.len(), 2);
/// assert!(selected.iter().all(|&index| index < fitness.len()));
/// ```
pub trait SelectionStrategy: Debug + Send + Sync {
    /// Selects `num_to_select` individuals by index.
    ///
    /// # Arguments
    ///
    /// * `fitness` - The fitness of each individual of the population.
    /// * `num_to_select` - The number of individuals to select.
    /// * `rng` - The random number generator driving the selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the population is empty.
    fn select(
        &self,
        fitness: &[Fitness],
        num_to_select: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<usize>>;
}
