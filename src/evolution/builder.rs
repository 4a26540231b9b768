use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    breeding::OperatorRegistry,
    error::{BeagleError, Result},
    gp::{Context, PrimitiveSuperSet},
    register::ParameterValue,
    rng::RandomNumberGenerator,
};

use super::{Evaluator, Evolver};

/// Operators run once to build generation 0.
pub const DEFAULT_BOOTSTRAP: &[&str] = &[
    "GP-InitHalfOp",
    "EvaluationOp",
    "StatsCalcOp",
    "TerminationOp",
];

/// Operators run every generation.
pub const DEFAULT_MAIN_LOOP: &[&str] = &[
    "SelectTournamentOp",
    "GP-CrossoverOp",
    "GP-MutationStandardOp",
    "GP-MutationShrinkOp",
    "GP-MutationSwapOp",
    "GP-MutationEphemeralOp",
    "EvaluationOp",
    "StatsCalcOp",
    "TerminationOp",
];

/// Assembles an [`Evolver`] from primitives, an evaluator, pipelines given
/// by operator name, and parameter overrides.
///
/// Overrides are applied before any operator declares its parameters, so
/// they take precedence over every default.
pub struct EvolverBuilder {
    primitives: Option<PrimitiveSuperSet>,
    evaluator: Option<Arc<dyn Evaluator>>,
    registry: Option<OperatorRegistry>,
    bootstrap: Vec<String>,
    main_loop: Vec<String>,
    parameters: Vec<(String, ParameterValue)>,
    arguments: Vec<String>,
    config_files: Vec<PathBuf>,
    seed: Option<u64>,
}

impl EvolverBuilder {
    pub fn new() -> Self {
        Self {
            primitives: None,
            evaluator: None,
            registry: None,
            bootstrap: DEFAULT_BOOTSTRAP.iter().map(|name| name.to_string()).collect(),
            main_loop: DEFAULT_MAIN_LOOP.iter().map(|name| name.to_string()).collect(),
            parameters: Vec::new(),
            arguments: Vec::new(),
            config_files: Vec::new(),
            seed: None,
        }
    }

    pub fn with_primitives(mut self, primitives: PrimitiveSuperSet) -> Self {
        self.primitives = Some(primitives);
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn with_shared_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Uses `registry` instead of the standard one, for custom operators.
    pub fn with_registry(mut self, registry: OperatorRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_bootstrap<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.bootstrap = names.iter().map(|name| name.as_ref().to_string()).collect();
        self
    }

    pub fn with_main_loop<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.main_loop = names.iter().map(|name| name.as_ref().to_string()).collect();
        self
    }

    pub fn with_parameter(mut self, name: &str, value: ParameterValue) -> Self {
        self.parameters.push((name.to_string(), value));
        self
    }

    /// Command-line arguments; those of the form `-OBname=value,name=value`
    /// override parameters, the others are ignored.
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// A JSON object of parameter overrides, applied before the other ones.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_files.push(path.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<Evolver> {
        let primitives = self.primitives.ok_or_else(|| {
            BeagleError::Configuration("Primitive super set not specified".to_string())
        })?;
        if primitives.is_empty() {
            return Err(BeagleError::Configuration(
                "Primitive super set holds no primitive set".to_string(),
            ));
        }
        let evaluator = self
            .evaluator
            .ok_or_else(|| BeagleError::Configuration("Evaluator not specified".to_string()))?;
        let registry = self
            .registry
            .unwrap_or_else(|| OperatorRegistry::standard(evaluator));

        let rng = match self.seed {
            Some(seed) => RandomNumberGenerator::from_seed(seed),
            None => RandomNumberGenerator::new(),
        };
        let mut context = Context::with_rng(primitives, rng);
        for path in &self.config_files {
            context.register.load_json(path)?;
        }
        for (name, value) in self.parameters {
            context.register.set(&name, value);
        }
        context.register.apply_arguments(self.arguments)?;

        let bootstrap = registry.build(&self.bootstrap)?;
        let main_loop = registry.build(&self.main_loop)?;
        Ok(Evolver::new(context, bootstrap, main_loop))
    }
}

impl Default for EvolverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
