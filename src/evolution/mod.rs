pub mod builder;
pub mod deme;
pub mod evaluator;
pub mod launcher;

pub use builder::EvolverBuilder;
pub use deme::{Deme, HallOfFame, Vivarium};
pub use evaluator::Evaluator;
pub use launcher::{EvolutionResult, Evolver, EvolverSettings};
