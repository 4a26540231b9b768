//! # beagle
//!
//! Genetic programming over strongly typed expression trees. Individuals are
//! sets of flattened trees; the first tree is the main program and the others
//! are automatically defined functions it may call. Evolved modules are
//! shared by the whole population through the context.
//!
//! An evolution is configured through a parameter register and two
//! pipelines of named operators, built and run by an
//! [`Evolver`](evolution::Evolver).

pub mod breeding;
pub mod error;
pub mod evolution;
pub mod fitness;
pub mod gp;
pub mod register;
pub mod rng;
pub mod selection;

// Re-export commonly used types for convenience
pub use breeding::{Operator, OperatorRegistry};
pub use error::{BeagleError, OptionExt, Result, ResultExt};
pub use evolution::{Evaluator, EvolutionResult, Evolver, EvolverBuilder};
pub use fitness::Fitness;
pub use register::{ParameterValue, Register};
