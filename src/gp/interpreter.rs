//! # Interpreter
//!
//! Executes the trees of one individual. The interpreter keeps its own call
//! stack of node indices within the tree being executed; a primitive asks
//! for the values of its children with [`Interpreter::evaluate_argument`].
//!
//! ADF and module calls switch execution to another tree. The caller's
//! location and call stack are suspended in an invocation frame, and an
//! [`Argument`](crate::gp::primitives::Argument) node in the callee resumes
//! the caller just long enough to evaluate the corresponding child of the
//! invoker node. Depending on the callee's [`ArgumentStrategy`] the child is
//! evaluated on every reference, once on first reference, or once before
//! the call.
//!
//! The node and time budgets cover everything one run executes, nested
//! calls and argument evaluations included.

use std::collections::HashMap;
use std::mem;
use std::time::{Duration, Instant};

use crate::error::{BeagleError, Result};
use crate::gp::context::Context;
use crate::gp::individual::Individual;
use crate::gp::primitive_set::ArgumentStrategy;
use crate::gp::tree::Tree;
use crate::gp::value::Value;

/// Tree being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeLocation {
    /// Tree of the individual, by index.
    Tree(usize),
    /// Module of the context's module vector, by slot.
    Module(usize),
}

impl Default for TreeLocation {
    fn default() -> Self {
        TreeLocation::Tree(0)
    }
}

#[derive(Debug, Default)]
struct ExecutionSnapshot {
    location: TreeLocation,
    call_stack: Vec<usize>,
}

#[derive(Debug)]
struct InvocationFrame {
    caller: ExecutionSnapshot,
    values: Vec<Option<Value>>,
    strategy: ArgumentStrategy,
}

pub struct Interpreter<'a> {
    context: &'a Context,
    individual: &'a Individual,
    location: TreeLocation,
    call_stack: Vec<usize>,
    frames: Vec<InvocationFrame>,
    variables: HashMap<String, Value>,
    nodes_executed: usize,
    started: Instant,
}

impl<'a> Interpreter<'a> {
    pub fn new(context: &'a Context, individual: &'a Individual) -> Self {
        Self {
            context,
            individual,
            location: TreeLocation::default(),
            call_stack: Vec::new(),
            frames: Vec::new(),
            variables: HashMap::new(),
            nodes_executed: 0,
            started: Instant::now(),
        }
    }

    pub fn context(&self) -> &'a Context {
        self.context
    }

    pub fn individual(&self) -> &'a Individual {
        self.individual
    }

    /// Binds the value returned by [`Variable`](crate::gp::primitives::Variable)
    /// terminals named `name`.
    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn variable(&self, name: &str) -> Result<Value> {
        self.variables.get(name).copied().ok_or_else(|| {
            BeagleError::Execution(format!("variable `{}` is not bound", name))
        })
    }

    /// Nodes executed by the current or last run.
    pub fn nodes_executed(&self) -> usize {
        self.nodes_executed
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Executes tree 0 and returns its value.
    pub fn run(&mut self) -> Result<Value> {
        self.run_tree(0)
    }

    /// Executes the tree at `tree_index` from its root, resetting the node
    /// counter and the clock.
    pub fn run_tree(&mut self, tree_index: usize) -> Result<Value> {
        self.nodes_executed = 0;
        self.started = Instant::now();
        self.frames.clear();
        self.call_stack.clear();
        self.location = TreeLocation::Tree(tree_index);
        if self.tree_at(self.location)?.is_empty() {
            return Err(BeagleError::Execution(format!(
                "tree {} is empty",
                tree_index
            )));
        }
        let value = self.interpret_node(0)?;
        self.check_time()?;
        Ok(value)
    }

    /// Executes the node at `index` of the current tree.
    pub fn interpret_node(&mut self, index: usize) -> Result<Value> {
        self.nodes_executed += 1;
        if let Some(allowed) = self.context.limits().max_nodes {
            if self.nodes_executed > allowed {
                return Err(BeagleError::NodesExceeded {
                    executed: self.nodes_executed,
                    allowed,
                });
            }
        }

        let tree = self.tree_at(self.location)?;
        let node = tree.node(index).ok_or(BeagleError::InvalidNode {
            index,
            size: tree.len(),
        })?;
        self.call_stack.push(index);
        let result = node.primitive.execute(self);
        self.call_stack.pop();
        let value = result?;
        self.check_time()?;
        Ok(value)
    }

    /// Executes child `n` of the node currently being executed.
    pub fn evaluate_argument(&mut self, n: usize) -> Result<Value> {
        let child = self.child_index(n)?;
        self.interpret_node(child)
    }

    /// Calls the tree at `target` with the children of the current node as
    /// its arguments.
    pub fn invoke(&mut self, target: TreeLocation, arity: usize) -> Result<Value> {
        let callee = self.tree_at(target)?;
        if callee.is_empty() {
            return Err(BeagleError::Execution(format!(
                "call into empty {:?}",
                target
            )));
        }
        if callee.number_arguments() != arity {
            return Err(BeagleError::Execution(format!(
                "{:?} takes {} arguments, invoked with {}",
                target,
                callee.number_arguments(),
                arity
            )));
        }
        let strategy = self
            .context
            .primitive_set(callee.primitive_set_index())?
            .argument_strategy();

        let mut values = vec![None; arity];
        if strategy == ArgumentStrategy::Precompute {
            for (n, slot) in values.iter_mut().enumerate() {
                *slot = Some(self.evaluate_argument(n)?);
            }
        }

        let caller = self.suspend();
        self.frames.push(InvocationFrame {
            caller,
            values,
            strategy,
        });
        self.location = target;
        let result = self.interpret_node(0);
        if let Some(frame) = self.frames.pop() {
            self.resume(frame.caller);
        }
        result
    }

    /// Value of argument `index` of the innermost call.
    pub fn argument_value(&mut self, index: usize) -> Result<Value> {
        let mut frame = self.frames.pop().ok_or_else(|| {
            BeagleError::Execution(format!("ARG{} referenced outside of a call", index))
        })?;
        if index >= frame.values.len() {
            let arity = frame.values.len();
            self.frames.push(frame);
            return Err(BeagleError::Execution(format!(
                "ARG{} referenced in a call with {} arguments",
                index, arity
            )));
        }
        if frame.strategy != ArgumentStrategy::JustInTime {
            if let Some(value) = frame.values[index] {
                self.frames.push(frame);
                return Ok(value);
            }
        }

        let callee = self.suspend();
        self.resume(mem::take(&mut frame.caller));
        let result = self.evaluate_argument(index);
        frame.caller = self.suspend();
        self.resume(callee);

        if let (Ok(value), ArgumentStrategy::Caching) = (&result, frame.strategy) {
            frame.values[index] = Some(*value);
        }
        self.frames.push(frame);
        result
    }

    fn tree_at(&self, location: TreeLocation) -> Result<&'a Tree> {
        let individual: &'a Individual = self.individual;
        let context: &'a Context = self.context;
        match location {
            TreeLocation::Tree(index) => individual.trees.get(index).ok_or_else(|| {
                BeagleError::Execution(format!(
                    "no tree {} in an individual of {} trees",
                    index,
                    individual.trees.len()
                ))
            }),
            TreeLocation::Module(index) => context.modules().get(index).ok_or_else(|| {
                BeagleError::Execution(format!("module slot {} is empty", index))
            }),
        }
    }

    fn child_index(&self, n: usize) -> Result<usize> {
        let tree = self.tree_at(self.location)?;
        let current = *self.call_stack.last().ok_or_else(|| {
            BeagleError::Execution("no node is being executed".to_string())
        })?;
        let arity = tree.nodes()[current].primitive.arity();
        if n >= arity {
            return Err(BeagleError::Execution(format!(
                "child {} requested from `{}` of arity {}",
                n,
                tree.nodes()[current].primitive.name(),
                arity
            )));
        }
        let mut child = current + 1;
        for _ in 0..n {
            child += tree.nodes()[child].subtree_size;
        }
        Ok(child)
    }

    fn suspend(&mut self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            location: self.location,
            call_stack: mem::take(&mut self.call_stack),
        }
    }

    fn resume(&mut self, snapshot: ExecutionSnapshot) {
        self.location = snapshot.location;
        self.call_stack = snapshot.call_stack;
    }

    fn check_time(&self) -> Result<()> {
        if let Some(allowed) = self.context.limits().max_time {
            let elapsed = self.started.elapsed();
            if elapsed > allowed {
                return Err(BeagleError::TimeExceeded { elapsed, allowed });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::context::ExecutionLimits;
    use crate::gp::primitive::Primitive;
    use crate::gp::primitive_set::{PrimitiveSet, PrimitiveSuperSet};
    use crate::gp::primitives::{
        AdfInvoker, Add, Argument, IfThenElse, ModuleInvoker, Multiply, Token, Variable,
    };
    use crate::gp::tree::Node;
    use crate::gp::value::ValueType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Terminal counting how many times it was executed.
    #[derive(Debug, Default)]
    struct Counter(AtomicUsize);

    impl Primitive for Counter {
        fn name(&self) -> &str {
            "COUNT"
        }

        fn arity(&self) -> usize {
            0
        }

        fn execute(&self, _interpreter: &mut Interpreter<'_>) -> Result<Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Float(2.0))
        }
    }

    /// Terminal that sleeps before returning.
    #[derive(Debug, Default)]
    struct Slow(AtomicUsize);

    impl Primitive for Slow {
        fn name(&self) -> &str {
            "SLOW"
        }

        fn arity(&self) -> usize {
            0
        }

        fn execute(&self, _interpreter: &mut Interpreter<'_>) -> Result<Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(Value::Float(1.0))
        }
    }

    fn n(primitive: impl Primitive + 'static) -> Node {
        Node::new(Arc::new(primitive))
    }

    fn tree(nodes: Vec<Node>, set: usize, arguments: usize) -> Tree {
        Tree::from_nodes(nodes, set, arguments).unwrap()
    }

    fn invoker(target: usize, arity: usize) -> Node {
        Node::new(
            AdfInvoker::new(target)
                .instantiate(None, arity)
                .unwrap()
                .unwrap(),
        )
    }

    fn context(strategy: ArgumentStrategy) -> Context {
        let sets = PrimitiveSuperSet::new()
            .with_set(PrimitiveSet::new())
            .with_set(PrimitiveSet::new().with_argument_strategy(strategy));
        Context::with_seed(sets, 1)
    }

    /// Tree 0 calls ADF1(COUNT); ADF1 is (+ ARG0 (* ARG0 ARG0)).
    fn counting_individual(counter: Arc<Counter>) -> Individual {
        let main = tree(vec![invoker(1, 1), Node::new(counter)], 0, 0);
        let adf = tree(
            vec![
                n(Add),
                n(Argument::new(0)),
                n(Multiply),
                n(Argument::new(0)),
                n(Argument::new(0)),
            ],
            1,
            1,
        );
        Individual::with_trees(vec![main, adf])
    }

    #[test]
    fn test_evaluates_with_variables() {
        let context = context(ArgumentStrategy::Caching);
        let individual = Individual::with_trees(vec![tree(
            vec![
                n(Add),
                n(Variable::new("X")),
                n(Multiply),
                n(Variable::new("X")),
                n(Variable::new("X")),
            ],
            0,
            0,
        )]);
        let mut interpreter = individual.interpreter(&context);
        interpreter.set_variable("X", Value::Float(3.0));
        assert_eq!(interpreter.run().unwrap(), Value::Float(12.0));
        assert_eq!(interpreter.nodes_executed(), 5);
    }

    #[test]
    fn test_unbound_variable_is_an_error() {
        let context = context(ArgumentStrategy::Caching);
        let individual = Individual::with_trees(vec![tree(vec![n(Variable::new("X"))], 0, 0)]);
        let result = individual.interpreter(&context).run();
        assert!(matches!(result, Err(BeagleError::Execution(_))));
    }

    #[test]
    fn test_argument_strategies() {
        for (strategy, expected_count) in [
            (ArgumentStrategy::JustInTime, 3),
            (ArgumentStrategy::Caching, 1),
            (ArgumentStrategy::Precompute, 1),
        ] {
            let context = context(strategy);
            let counter = Arc::new(Counter::default());
            let individual = counting_individual(Arc::clone(&counter));
            let value = individual.interpreter(&context).run().unwrap();
            assert_eq!(value, Value::Float(6.0), "{:?}", strategy);
            assert_eq!(counter.0.load(Ordering::SeqCst), expected_count, "{:?}", strategy);
        }
    }

    #[test]
    fn test_unused_argument_is_only_precomputed() {
        // ADF1 ignores its argument: (IFTE true 1 ARG0) never reaches ARG0.
        let adf = tree(
            vec![
                n(IfThenElse::new(ValueType::Any)),
                n(Token::new("T", Value::Bool(true))),
                n(Token::new("ONE", Value::Float(1.0))),
                n(Argument::new(0)),
            ],
            1,
            1,
        );
        for (strategy, expected_count) in [
            (ArgumentStrategy::Caching, 0),
            (ArgumentStrategy::Precompute, 1),
        ] {
            let context = context(strategy);
            let counter = Arc::new(Counter::default());
            let main = tree(vec![invoker(1, 1), Node::new(counter.clone())], 0, 0);
            let individual = Individual::with_trees(vec![main, adf.clone()]);
            assert_eq!(
                individual.interpreter(&context).run().unwrap(),
                Value::Float(1.0)
            );
            assert_eq!(counter.0.load(Ordering::SeqCst), expected_count);
        }
    }

    #[test]
    fn test_nested_calls_resolve_arguments_in_the_right_frame() {
        // Tree 0: ADF1(X); tree 1: ADF2(ARG0, ARG0); tree 2: (* ARG0 ARG1).
        let sets = PrimitiveSuperSet::new()
            .with_set(PrimitiveSet::new())
            .with_set(PrimitiveSet::new())
            .with_set(PrimitiveSet::new());
        let context = Context::with_seed(sets, 1);
        let individual = Individual::with_trees(vec![
            tree(vec![invoker(1, 1), n(Variable::new("X"))], 0, 0),
            tree(
                vec![invoker(2, 2), n(Argument::new(0)), n(Argument::new(0))],
                1,
                1,
            ),
            tree(
                vec![n(Multiply), n(Argument::new(0)), n(Argument::new(1))],
                2,
                2,
            ),
        ]);
        let mut interpreter = individual.interpreter(&context);
        interpreter.set_variable("X", Value::Float(5.0));
        assert_eq!(interpreter.run().unwrap(), Value::Float(25.0));
    }

    #[test]
    fn test_module_call() {
        let mut context = context(ArgumentStrategy::Caching);
        let module = tree(
            vec![n(Add), n(Argument::new(0)), n(Token::new("ONE", Value::Float(1.0)))],
            0,
            1,
        );
        let slot = context.modules_mut().insert(module);
        let call = ModuleInvoker::new(slot, ValueType::Any, vec![ValueType::Any]);
        let individual = Individual::with_trees(vec![tree(
            vec![n(call), n(Token::new("TWO", Value::Float(2.0)))],
            0,
            0,
        )]);
        assert_eq!(
            individual.interpreter(&context).run().unwrap(),
            Value::Float(3.0)
        );
    }

    #[test]
    fn test_node_budget_covers_nested_calls() {
        let mut context = context(ArgumentStrategy::JustInTime);
        let individual = counting_individual(Arc::new(Counter::default()));
        // Invoker, five ADF nodes and three argument evaluations.
        context.set_limits(ExecutionLimits::unlimited().with_max_nodes(9));
        assert!(individual.interpreter(&context).run().is_ok());

        context.set_limits(ExecutionLimits::unlimited().with_max_nodes(8));
        let error = individual.interpreter(&context).run().unwrap_err();
        assert!(error.is_resources_exceeded());
        assert!(matches!(
            error,
            BeagleError::NodesExceeded {
                executed: 9,
                allowed: 8
            }
        ));
    }

    #[test]
    fn test_time_budget_stops_at_the_first_late_node() {
        let mut context = context(ArgumentStrategy::Caching);
        let slow = Arc::new(Slow::default());
        let individual = Individual::with_trees(vec![tree(
            vec![n(Add), Node::new(slow.clone()), Node::new(slow.clone())],
            0,
            0,
        )]);
        assert_eq!(
            individual.interpreter(&context).run().unwrap(),
            Value::Float(2.0)
        );

        slow.0.store(0, Ordering::SeqCst);
        context.set_limits(ExecutionLimits::unlimited().with_max_time(Duration::from_millis(5)));
        let error = individual.interpreter(&context).run().unwrap_err();
        assert!(error.is_resources_exceeded());
        assert!(matches!(
            error,
            BeagleError::TimeExceeded { allowed, .. } if allowed == Duration::from_millis(5)
        ));
        assert_eq!(slow.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_argument_outside_call_is_an_error() {
        let context = context(ArgumentStrategy::Caching);
        let individual = Individual::with_trees(vec![tree(
            vec![n(Add), n(Argument::new(0)), n(Argument::new(0))],
            0,
            0,
        )]);
        assert!(matches!(
            individual.interpreter(&context).run(),
            Err(BeagleError::Execution(_))
        ));
    }
}
