use std::cmp::Ordering;

use crate::breeding::Stats;
use crate::gp::individual::Individual;

/// A sub-population evolving under the same pipeline as its siblings.
#[derive(Debug, Clone, Default)]
pub struct Deme {
    pub population: Vec<Individual>,
    /// Statistics of the last `StatsCalcOp` run on this deme.
    pub stats: Option<Stats>,
}

impl Deme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_population(population: Vec<Individual>) -> Self {
        Self {
            population,
            stats: None,
        }
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    pub fn best(&self) -> Option<&Individual> {
        best_of(self.population.iter())
    }

    /// Population indices from best to worst.
    fn ranking(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.population.len()).collect();
        indices.sort_by(|&a, &b| {
            self.population[b]
                .fitness
                .compare(&self.population[a].fitness)
        });
        indices
    }
}

/// Best individual by fitness; the first one wins ties.
pub(crate) fn best_of<'a, I>(individuals: I) -> Option<&'a Individual>
where
    I: Iterator<Item = &'a Individual>,
{
    individuals.fold(None, |best: Option<&Individual>, candidate| match best {
        Some(current) if current.fitness.compare(&candidate.fitness) != Ordering::Less => {
            Some(current)
        }
        _ => Some(candidate),
    })
}

/// The best distinct individuals ever seen, best first.
#[derive(Debug, Clone, Default)]
pub struct HallOfFame {
    capacity: usize,
    members: Vec<Individual>,
}

impl HallOfFame {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            members: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn best(&self) -> Option<&Individual> {
        self.members.first()
    }

    /// Replaces the members, keeping the ordering and capacity invariants.
    pub fn restore(&mut self, members: Vec<Individual>) {
        self.members.clear();
        self.update(&members);
    }

    /// Offers candidates to the hall of fame; returns how many entered it.
    ///
    /// Individuals with an invalid fitness are ignored, and so are copies of
    /// a member (same fitness and same trees).
    pub fn update<'a, I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = &'a Individual>,
    {
        if self.capacity == 0 {
            return 0;
        }
        let mut inserted = 0;
        for candidate in candidates {
            if !candidate.fitness.is_valid() {
                continue;
            }
            if self.members.len() == self.capacity {
                let worst = &self.members[self.members.len() - 1];
                if candidate.fitness.compare(&worst.fitness) != Ordering::Greater {
                    continue;
                }
            }
            if self.contains(candidate) {
                continue;
            }
            let position = self
                .members
                .partition_point(|member| member.fitness.compare(&candidate.fitness) != Ordering::Less);
            self.members.insert(position, candidate.clone());
            self.members.truncate(self.capacity);
            inserted += 1;
        }
        inserted
    }

    fn contains(&self, candidate: &Individual) -> bool {
        let text = candidate.to_string();
        self.members
            .iter()
            .any(|member| member.fitness == candidate.fitness && member.to_string() == text)
    }
}

/// Every deme of an evolution plus the population-wide hall of fame.
#[derive(Debug, Clone, Default)]
pub struct Vivarium {
    pub demes: Vec<Deme>,
    pub hall_of_fame: HallOfFame,
}

impl Vivarium {
    pub fn new(demes: usize, hall_of_fame: usize) -> Self {
        Self {
            demes: (0..demes).map(|_| Deme::new()).collect(),
            hall_of_fame: HallOfFame::new(hall_of_fame),
        }
    }

    pub fn individuals(&self) -> impl Iterator<Item = &Individual> {
        self.demes.iter().flat_map(|deme| deme.population.iter())
    }

    /// Best individual of the demes and the hall of fame.
    pub fn best(&self) -> Option<&Individual> {
        best_of(self.hall_of_fame.members().iter().chain(self.individuals()))
    }

    pub fn update_hall_of_fame(&mut self) -> usize {
        let Self {
            demes,
            hall_of_fame,
        } = self;
        hall_of_fame.update(demes.iter().flat_map(|deme| deme.population.iter()))
    }

    pub fn stats(&self, generation: usize) -> Stats {
        Stats::compute(generation, self.individuals())
    }

    /// Ring migration: copies of the `count` best individuals of each deme
    /// replace the `count` worst of the next deme. Returns the number of
    /// migrants moved.
    pub fn migrate_ring(&mut self, count: usize) -> usize {
        let size = self.demes.len();
        if size < 2 || count == 0 {
            return 0;
        }
        let emigrants: Vec<Vec<Individual>> = self
            .demes
            .iter()
            .map(|deme| {
                deme.ranking()
                    .into_iter()
                    .take(count)
                    .map(|index| deme.population[index].clone())
                    .collect()
            })
            .collect();

        let mut moved = 0;
        for (source, migrants) in emigrants.into_iter().enumerate() {
            let target = &mut self.demes[(source + 1) % size];
            let worst: Vec<usize> = target.ranking().into_iter().rev().take(migrants.len()).collect();
            for (index, migrant) in worst.into_iter().zip(migrants) {
                target.population[index] = migrant;
                moved += 1;
            }
        }
        moved
    }
}
