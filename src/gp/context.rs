//! # Context
//!
//! The `Context` carries the state shared by the operators of one thread of
//! control: the random source, the parameter register, the primitive super
//! set, the population-wide module vector, and the call stack structural
//! operators use to locate a node inside a tree.
//!
//! Interpretation does not mutate the context. Each evaluation builds an
//! [`Interpreter`](crate::gp::Interpreter) borrowing it, so individuals can
//! be evaluated in parallel over one shared `&Context`.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::gp::module::ModuleVector;
use crate::gp::primitive_set::{PrimitiveSet, PrimitiveSuperSet};
use crate::register::{ParameterValue, Register};
use crate::rng::RandomNumberGenerator;

/// Ceilings enforced by the interpreter; `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub max_nodes: Option<usize>,
    pub max_time: Option<Duration>,
}

impl ExecutionLimits {
    pub const MAX_NODES: &'static str = "gp.eval.maxnodes";
    pub const MAX_TIME: &'static str = "gp.eval.maxtime";

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn declare(register: &mut Register) {
        register.declare(
            Self::MAX_NODES,
            ParameterValue::Int(0),
            "maximum number of nodes executed per evaluation (0 = unlimited)",
        );
        register.declare(
            Self::MAX_TIME,
            ParameterValue::Float(0.0),
            "maximum seconds spent per evaluation (0 = unlimited)",
        );
    }

    /// Reads `gp.eval.maxnodes` (0 = unlimited) and `gp.eval.maxtime`
    /// (seconds, 0 = unlimited).
    pub fn from_register(register: &Register) -> Result<Self> {
        let max_nodes = register.uint(Self::MAX_NODES)?;
        let max_time = register.float(Self::MAX_TIME)?;
        Ok(Self {
            max_nodes: (max_nodes > 0).then_some(max_nodes),
            max_time: (max_time > 0.0).then(|| Duration::from_secs_f64(max_time)),
        })
    }
}

#[derive(Debug)]
pub struct Context {
    pub rng: RandomNumberGenerator,
    pub register: Register,
    primitives: Arc<PrimitiveSuperSet>,
    modules: ModuleVector,
    call_stack: Vec<usize>,
    tree_index: usize,
    tree_arguments: Vec<usize>,
    limits: ExecutionLimits,
    generation: usize,
    deme_index: usize,
    terminate: bool,
}

impl Context {
    pub fn new(primitives: PrimitiveSuperSet) -> Self {
        Self::with_rng(primitives, RandomNumberGenerator::new())
    }

    pub fn with_seed(primitives: PrimitiveSuperSet, seed: u64) -> Self {
        Self::with_rng(primitives, RandomNumberGenerator::from_seed(seed))
    }

    pub fn with_rng(primitives: PrimitiveSuperSet, rng: RandomNumberGenerator) -> Self {
        Self {
            rng,
            register: Register::new(),
            primitives: Arc::new(primitives),
            modules: ModuleVector::new(),
            call_stack: Vec::new(),
            tree_index: 0,
            tree_arguments: Vec::new(),
            limits: ExecutionLimits::default(),
            generation: 0,
            deme_index: 0,
            terminate: false,
        }
    }

    pub fn primitives(&self) -> &PrimitiveSuperSet {
        &self.primitives
    }

    pub fn shared_primitives(&self) -> Arc<PrimitiveSuperSet> {
        Arc::clone(&self.primitives)
    }

    pub fn primitive_set(&self, index: usize) -> Result<&PrimitiveSet> {
        self.primitives.get(index)
    }

    pub fn modules(&self) -> &ModuleVector {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut ModuleVector {
        &mut self.modules
    }

    pub fn set_modules(&mut self, modules: ModuleVector) {
        self.modules = modules;
    }

    pub fn call_stack(&self) -> &[usize] {
        &self.call_stack
    }

    pub fn push_call_stack(&mut self, index: usize) {
        self.call_stack.push(index);
    }

    pub fn pop_call_stack(&mut self) -> Option<usize> {
        self.call_stack.pop()
    }

    pub fn clear_call_stack(&mut self) {
        self.call_stack.clear();
    }

    /// Node on top of the call stack.
    pub fn node_index(&self) -> Option<usize> {
        self.call_stack.last().copied()
    }

    pub fn tree_index(&self) -> usize {
        self.tree_index
    }

    pub fn set_tree_index(&mut self, tree_index: usize) {
        self.tree_index = tree_index;
    }

    /// Argument counts of the trees of the individual being validated.
    pub fn tree_arguments(&self) -> &[usize] {
        &self.tree_arguments
    }

    pub fn set_tree_arguments(&mut self, tree_arguments: Vec<usize>) {
        self.tree_arguments = tree_arguments;
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: ExecutionLimits) {
        self.limits = limits;
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn set_generation(&mut self, generation: usize) {
        self.generation = generation;
    }

    pub fn deme_index(&self) -> usize {
        self.deme_index
    }

    pub fn set_deme_index(&mut self, deme_index: usize) {
        self.deme_index = deme_index;
    }

    /// Asks the evolver to stop after the current generation.
    pub fn request_termination(&mut self) {
        self.terminate = true;
    }

    pub fn is_termination_requested(&self) -> bool {
        self.terminate
    }

    pub fn clear_termination(&mut self) {
        self.terminate = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::ParameterValue;

    #[test]
    fn test_limits_from_register() {
        let mut register = Register::new();
        register.declare(ExecutionLimits::MAX_NODES, ParameterValue::Int(0), "");
        register.declare(ExecutionLimits::MAX_TIME, ParameterValue::Float(0.0), "");
        assert_eq!(
            ExecutionLimits::from_register(&register).unwrap(),
            ExecutionLimits::unlimited()
        );

        register.set(ExecutionLimits::MAX_NODES, ParameterValue::Int(500));
        register.set(ExecutionLimits::MAX_TIME, ParameterValue::Float(0.5));
        let limits = ExecutionLimits::from_register(&register).unwrap();
        assert_eq!(limits.max_nodes, Some(500));
        assert_eq!(limits.max_time, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_call_stack_discipline() {
        let mut context = Context::with_seed(PrimitiveSuperSet::new(), 1);
        assert_eq!(context.node_index(), None);
        context.push_call_stack(0);
        context.push_call_stack(3);
        assert_eq!(context.node_index(), Some(3));
        assert_eq!(context.pop_call_stack(), Some(3));
        context.clear_call_stack();
        assert!(context.call_stack().is_empty());
    }

    #[test]
    fn test_termination_flag() {
        let mut context = Context::with_seed(PrimitiveSuperSet::new(), 1);
        assert!(!context.is_termination_requested());
        context.request_termination();
        assert!(context.is_termination_requested());
        context.clear_termination();
        assert!(!context.is_termination_requested());
    }
}
