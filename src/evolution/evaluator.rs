use crate::error::Result;
use crate::fitness::Fitness;
use crate::gp::context::Context;
use crate::gp::individual::Individual;

/// Problem-specific fitness function.
///
/// Evaluators run on a shared `&Context`, possibly from several threads at
/// once, and build an [`Interpreter`](crate::gp::Interpreter) per call.
///
/// # Examples
///
/// ```
/// use beagle::error::Result;
/// use beagle::evolution::Evaluator;
/// use beagle::fitness::Fitness;
/// use beagle::gp::{Context, Individual};
///
/// struct Parsimony;
///
/// impl Evaluator for Parsimony {
///     fn evaluate(&self, individual: &Individual, _context: &Context) -> Result<Fitness> {
///         Ok(Fitness::new(1.0 / (1.0 + individual.size() as f64)))
///     }
/// }
/// ```
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, individual: &Individual, context: &Context) -> Result<Fitness>;

    /// Fitness given to an individual whose execution ran out of budget.
    fn exhausted_fitness(&self) -> Fitness {
        Fitness::new(f64::MIN)
    }
}

impl<F> Evaluator for F
where
    F: Fn(&Individual, &Context) -> Result<Fitness> + Send + Sync,
{
    fn evaluate(&self, individual: &Individual, context: &Context) -> Result<Fitness> {
        self(individual, context)
    }
}
