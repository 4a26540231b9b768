use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::breeding::{EvaluationOp, Operator, SelectTournamentOp, StatsCalcOp, TerminationOp};
use crate::error::{BeagleError, Result};
use crate::evolution::Evaluator;
use crate::gp::{CrossoverOp, EmaOp, InitializationOp, MutationOp};

/// Builds a fresh operator instance.
pub type OperatorFactory = Box<dyn Fn() -> Box<dyn Operator> + Send + Sync>;

/// Operator factories by name.
#[derive(Default)]
pub struct OperatorRegistry {
    factories: BTreeMap<String, OperatorFactory>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in operator, with `evaluator` behind
    /// `EvaluationOp`.
    pub fn standard(evaluator: Arc<dyn Evaluator>) -> Self {
        let mut registry = Self::new();
        registry.insert("GP-InitGrowOp", InitializationOp::grow);
        registry.insert("GP-InitFullOp", InitializationOp::full);
        registry.insert("GP-InitHalfOp", InitializationOp::half);
        registry.insert("GP-CrossoverOp", CrossoverOp::new);
        registry.insert("GP-CrossoverConstrainedOp", CrossoverOp::constrained);
        registry.insert("GP-MutationStandardOp", MutationOp::standard);
        registry.insert("GP-MutationSwapOp", MutationOp::swap);
        registry.insert("GP-MutationShrinkOp", MutationOp::shrink);
        registry.insert("GP-MutationEphemeralOp", MutationOp::ephemeral);
        registry.insert("GP-EMACompressOp", EmaOp::compress);
        registry.insert("GP-EMAExpandOp", EmaOp::expand);
        registry.insert("SelectTournamentOp", SelectTournamentOp::new);
        registry.insert("StatsCalcOp", StatsCalcOp::new);
        registry.insert("TerminationOp", TerminationOp::new);
        registry.insert("EvaluationOp", move || EvaluationOp::new(Arc::clone(&evaluator)));
        registry
    }

    fn insert<O, F>(&mut self, name: &str, build: F)
    where
        O: Operator + 'static,
        F: Fn() -> O + Send + Sync + 'static,
    {
        let factory: OperatorFactory = Box::new(move || Box::new(build()) as Box<dyn Operator>);
        self.factories.insert(name.to_string(), factory);
    }

    /// Adds an operator under `name`. A name can only be registered once.
    pub fn register<O, F>(&mut self, name: &str, build: F) -> Result<()>
    where
        O: Operator + 'static,
        F: Fn() -> O + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(BeagleError::Configuration(format!(
                "operator `{}` is already registered",
                name
            )));
        }
        self.insert(name, build);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Operator>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| BeagleError::Configuration(format!("unknown operator `{}`", name)))
    }

    /// Instantiates a pipeline from operator names, in order.
    pub fn build<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Box<dyn Operator>>> {
        names.iter().map(|name| self.create(name.as_ref())).collect()
    }

    /// Instantiates a pipeline from a whitespace separated list of names.
    pub fn parse_pipeline(&self, text: &str) -> Result<Vec<Box<dyn Operator>>> {
        let names: Vec<&str> = text.split_whitespace().collect();
        self.build(&names)
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
