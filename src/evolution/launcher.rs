use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::breeding::{Operator, Stats};
use crate::error::{BeagleError, OptionExt, Result};
use crate::evolution::deme::Vivarium;
use crate::gp::context::{Context, ExecutionLimits};
use crate::gp::individual::Individual;
use crate::gp::persistence::Milestone;
use crate::register::{ParameterValue, Register};

pub const DEMES: &str = "ec.demes";
pub const MAX_GENERATIONS: &str = "ec.term.maxgen";
pub const MIGRATION_SIZE: &str = "ec.mig.size";
pub const HALL_OF_FAME_SIZE: &str = "ec.hof.vivasize";
pub const RANDOM_SEED: &str = "ec.rand.seed";
pub const MILESTONE_PREFIX: &str = "ms.write.prefix";
pub const MILESTONE_INTERVAL: &str = "ms.write.interval";
pub const RESTART_FILE: &str = "ms.restart.file";

/// Run-level parameters read by the evolver.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolverSettings {
    pub demes: usize,
    pub max_generations: usize,
    pub migration_size: usize,
    pub hall_of_fame_size: usize,
    /// 0 keeps the generator the context was built with.
    pub seed: u64,
    /// Empty disables milestones.
    pub milestone_prefix: String,
    /// Generations between milestones; 0 writes only the final one.
    pub milestone_interval: usize,
    /// Empty starts a fresh run.
    pub restart_file: String,
}

impl Default for EvolverSettings {
    fn default() -> Self {
        Self {
            demes: 1,
            max_generations: 50,
            migration_size: 0,
            hall_of_fame_size: 1,
            seed: 0,
            milestone_prefix: String::new(),
            milestone_interval: 0,
            restart_file: String::new(),
        }
    }
}

impl EvolverSettings {
    pub fn declare(register: &mut Register) {
        let defaults = Self::default();
        register.declare(
            DEMES,
            ParameterValue::Int(defaults.demes as i64),
            "number of demes",
        );
        register.declare(
            MAX_GENERATIONS,
            ParameterValue::Int(defaults.max_generations as i64),
            "generation at which the evolution stops",
        );
        register.declare(
            MIGRATION_SIZE,
            ParameterValue::Int(defaults.migration_size as i64),
            "individuals migrating between neighbouring demes each generation",
        );
        register.declare(
            HALL_OF_FAME_SIZE,
            ParameterValue::Int(defaults.hall_of_fame_size as i64),
            "size of the population-wide hall of fame",
        );
        register.declare(
            RANDOM_SEED,
            ParameterValue::Int(0),
            "seed of the random generator (0 = keep the current one)",
        );
        register.declare(
            MILESTONE_PREFIX,
            ParameterValue::Text(String::new()),
            "prefix of milestone files (empty = no milestone)",
        );
        register.declare(
            MILESTONE_INTERVAL,
            ParameterValue::Int(0),
            "generations between milestones (0 = final milestone only)",
        );
        register.declare(
            RESTART_FILE,
            ParameterValue::Text(String::new()),
            "milestone to restart the evolution from",
        );
    }

    pub fn from_register(register: &Register) -> Result<Self> {
        let seed = register.int(RANDOM_SEED)?;
        if seed < 0 {
            return Err(BeagleError::Parameter(format!(
                "parameter `{}` must not be negative, found {}",
                RANDOM_SEED, seed
            )));
        }
        Ok(Self {
            demes: register.uint(DEMES)?,
            max_generations: register.uint(MAX_GENERATIONS)?,
            migration_size: register.uint(MIGRATION_SIZE)?,
            hall_of_fame_size: register.uint(HALL_OF_FAME_SIZE)?,
            seed: seed as u64,
            milestone_prefix: register.text(MILESTONE_PREFIX)?,
            milestone_interval: register.uint(MILESTONE_INTERVAL)?,
            restart_file: register.text(RESTART_FILE)?,
        })
    }
}

/// Outcome of a completed evolution.
#[derive(Debug, Clone)]
pub struct EvolutionResult {
    /// Best individual of the final demes and the hall of fame.
    pub best: Individual,
    /// Last generation run.
    pub generation: usize,
    /// Statistics over every deme at the last generation.
    pub stats: Stats,
    pub hall_of_fame: Vec<Individual>,
}

/// Drives the bootstrap and main-loop pipelines over every deme.
///
/// A run goes through `initialize` (parameter declaration), `bootstrap`
/// (initial population or milestone restart) and repeated `step`s until the
/// generation limit is hit or an operator requests termination. After each
/// generation the hall of fame is updated, unreferenced modules are released
/// and a milestone may be written.
#[derive(Debug)]
pub struct Evolver {
    context: Context,
    bootstrap: Vec<Box<dyn Operator>>,
    main_loop: Vec<Box<dyn Operator>>,
    vivarium: Vivarium,
    settings: EvolverSettings,
    initialized: bool,
}

impl Evolver {
    pub fn new(
        context: Context,
        bootstrap: Vec<Box<dyn Operator>>,
        main_loop: Vec<Box<dyn Operator>>,
    ) -> Self {
        Self {
            context,
            bootstrap,
            main_loop,
            vivarium: Vivarium::default(),
            settings: EvolverSettings::default(),
            initialized: false,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn vivarium(&self) -> &Vivarium {
        &self.vivarium
    }

    pub fn settings(&self) -> &EvolverSettings {
        &self.settings
    }

    pub fn generation(&self) -> usize {
        self.context.generation()
    }

    /// Declares every parameter and lets the operators read theirs.
    pub fn initialize(&mut self) -> Result<()> {
        let register = &mut self.context.register;
        EvolverSettings::declare(register);
        ExecutionLimits::declare(register);
        for operator in self.bootstrap.iter_mut().chain(self.main_loop.iter_mut()) {
            trace!(operator = operator.name(), "initializing operator");
            operator.initialize(register)?;
        }
        for name in register.unused_overrides() {
            warn!(parameter = name, "override matches no declared parameter");
        }

        let settings = EvolverSettings::from_register(register)?;
        if settings.demes == 0 {
            return Err(BeagleError::Configuration(
                "an evolution needs at least one deme".to_string(),
            ));
        }
        let limits = ExecutionLimits::from_register(register)?;
        self.context.set_limits(limits);
        if settings.seed != 0 {
            self.context.rng.reseed(settings.seed);
        }
        self.vivarium = Vivarium::new(settings.demes, settings.hall_of_fame_size);
        debug!(?settings, ?limits, "evolver initialized");
        self.settings = settings;
        self.initialized = true;
        Ok(())
    }

    /// Builds generation 0, either from the bootstrap pipeline or from the
    /// restart milestone.
    pub fn bootstrap(&mut self) -> Result<()> {
        self.context.clear_termination();
        if !self.settings.restart_file.is_empty() {
            let path = PathBuf::from(&self.settings.restart_file);
            return self.restart(&path);
        }
        self.context.set_generation(0);
        for (index, deme) in self.vivarium.demes.iter_mut().enumerate() {
            self.context.set_deme_index(index);
            for operator in self.bootstrap.iter_mut() {
                trace!(operator = operator.name(), deme = index, "bootstrap");
                operator.operate(deme, &mut self.context)?;
            }
        }
        self.end_generation()
    }

    /// Restores demes, hall of fame, modules and generation from a milestone.
    pub fn restart(&mut self, path: &Path) -> Result<()> {
        let milestone = Milestone::read(path)?;
        let primitives = self.context.shared_primitives();
        let demes = milestone.restore_demes(&primitives)?;
        if demes.is_empty() {
            return Err(BeagleError::Format(format!(
                "milestone {} holds no deme",
                path.display()
            )));
        }
        if demes.len() != self.settings.demes {
            warn!(
                expected = self.settings.demes,
                found = demes.len(),
                "milestone deme count differs from configuration"
            );
        }
        self.vivarium.demes = demes;
        self.vivarium
            .hall_of_fame
            .restore(milestone.restore_hall_of_fame(&primitives)?);
        self.context.set_modules(milestone.restore_modules(&primitives)?);
        self.context.set_generation(milestone.generation);
        info!(
            path = %path.display(),
            generation = milestone.generation,
            "evolution restarted from milestone"
        );
        Ok(())
    }

    /// Runs one generation of the main loop on every deme.
    pub fn step(&mut self) -> Result<()> {
        let generation = self.context.generation() + 1;
        self.context.set_generation(generation);
        for (index, deme) in self.vivarium.demes.iter_mut().enumerate() {
            self.context.set_deme_index(index);
            for operator in self.main_loop.iter_mut() {
                trace!(operator = operator.name(), deme = index, generation, "main loop");
                operator.operate(deme, &mut self.context)?;
            }
        }
        let migrants = self.vivarium.migrate_ring(self.settings.migration_size);
        if migrants > 0 {
            debug!(generation, migrants, "ring migration");
        }
        self.end_generation()
    }

    fn end_generation(&mut self) -> Result<()> {
        let generation = self.context.generation();
        let entered = self.vivarium.update_hall_of_fame();
        let Self {
            context, vivarium, ..
        } = self;
        let released = context
            .modules_mut()
            .cleanup(vivarium.individuals().chain(vivarium.hall_of_fame.members()));

        let stats = self.vivarium.stats(generation);
        info!(
            generation,
            best = stats.best,
            mean = stats.mean,
            best_hits = stats.best_hits,
            mean_size = stats.mean_size,
            hall_of_fame_entries = entered,
            modules = self.context.modules().occupied(),
            released_modules = released,
            "generation done"
        );

        let interval = self.settings.milestone_interval;
        if interval > 0 && generation % interval == 0 {
            self.write_milestone()?;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.context.is_termination_requested()
            || self.context.generation() >= self.settings.max_generations
    }

    /// Path of the milestone file, if milestones are enabled.
    pub fn milestone_path(&self) -> Option<PathBuf> {
        let prefix = &self.settings.milestone_prefix;
        (!prefix.is_empty()).then(|| PathBuf::from(format!("{}.milestone.json", prefix)))
    }

    pub fn write_milestone(&self) -> Result<()> {
        let Some(path) = self.milestone_path() else {
            return Ok(());
        };
        Milestone::capture(
            self.context.generation(),
            &self.vivarium.demes,
            self.vivarium.hall_of_fame.members(),
            self.context.modules(),
        )
        .write(&path)
    }

    /// Runs a complete evolution and reports its best individual.
    ///
    /// # Errors
    ///
    /// Configuration, parameter, persistence and non-budget execution errors
    /// raised by any operator abort the run.
    pub fn evolve(&mut self) -> Result<EvolutionResult> {
        if !self.initialized {
            self.initialize()?;
        }
        self.bootstrap()?;
        while !self.is_finished() {
            self.step()?;
        }
        if self.context.is_termination_requested() {
            info!(generation = self.generation(), "evolution terminated early");
        }
        self.write_milestone()?;

        let best = self
            .vivarium
            .best()
            .cloned()
            .ok_or_else_beagle(|| BeagleError::EmptyPopulation)?;
        Ok(EvolutionResult {
            best,
            generation: self.generation(),
            stats: self.vivarium.stats(self.generation()),
            hall_of_fame: self.vivarium.hall_of_fame.members().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_defaults_match_settings_defaults() {
        let mut register = Register::new();
        EvolverSettings::declare(&mut register);
        let settings = EvolverSettings::from_register(&register).unwrap();
        assert_eq!(settings, EvolverSettings::default());
        assert_eq!(settings.migration_size, 0);
        assert_eq!(settings.max_generations, 50);
        assert_eq!(register.uint(MIGRATION_SIZE).unwrap(), 0);
    }

    #[test]
    fn test_negative_seed_is_rejected() {
        let mut register = Register::new();
        register.set(RANDOM_SEED, ParameterValue::Int(-3));
        EvolverSettings::declare(&mut register);
        assert!(matches!(
            EvolverSettings::from_register(&register),
            Err(BeagleError::Parameter(_))
        ));
    }
}
