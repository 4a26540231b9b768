//! # Breeding
//!
//! The evolutionary loop is a pipeline of named operators. Every operator
//! declares its parameters in the [`Register`] once, then works on one deme
//! at a time. Pipelines are assembled from names through an
//! [`OperatorRegistry`], so a run can be configured without recompiling.

pub mod evaluation;
pub mod registry;
pub mod selection;
pub mod statistics;
pub mod termination;

use std::fmt::Debug;

use crate::error::Result;
use crate::evolution::Deme;
use crate::gp::context::Context;
use crate::register::Register;

pub use evaluation::EvaluationOp;
pub use registry::{OperatorFactory, OperatorRegistry};
pub use selection::SelectTournamentOp;
pub use statistics::{Stats, StatsCalcOp};
pub use termination::TerminationOp;

/// A step of the breeding pipeline.
///
/// `initialize` is called once before evolution starts. It declares the
/// operator's parameters, keeping any value already registered under the
/// same name, and reads their current values.
pub trait Operator: Debug + Send {
    /// Name the operator is registered and logged under.
    fn name(&self) -> &str;

    /// Declares and reads the operator's parameters.
    fn initialize(&mut self, register: &mut Register) -> Result<()>;

    /// Applies the operator to one deme.
    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()>;
}
