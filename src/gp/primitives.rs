//! Built-in primitives: arithmetic, trigonometric and logical functions,
//! comparisons, conditional, variables, tokens, ephemeral constants, and the
//! argument references and invokers used by ADFs and evolved modules.

use std::sync::Arc;

use crate::error::{BeagleError, Result};
use crate::gp::context::Context;
use crate::gp::interpreter::{Interpreter, TreeLocation};
use crate::gp::primitive::{Primitive, PrimitiveKind, SelectionScope};
use crate::gp::tree::Tree;
use crate::gp::value::{Value, ValueType};
use crate::rng::RandomNumberGenerator;

fn binary_float<F>(interpreter: &mut Interpreter<'_>, op: F) -> Result<Value>
where
    F: FnOnce(f64, f64) -> f64,
{
    let lhs = interpreter.evaluate_argument(0)?.as_float()?;
    let rhs = interpreter.evaluate_argument(1)?.as_float()?;
    Ok(Value::Float(op(lhs, rhs)))
}

fn unary_float<F>(interpreter: &mut Interpreter<'_>, op: F) -> Result<Value>
where
    F: FnOnce(f64) -> f64,
{
    let x = interpreter.evaluate_argument(0)?.as_float()?;
    Ok(Value::Float(op(x)))
}

fn binary_bool<F>(interpreter: &mut Interpreter<'_>, op: F) -> Result<Value>
where
    F: FnOnce(bool, bool) -> bool,
{
    let lhs = interpreter.evaluate_argument(0)?.as_bool()?;
    let rhs = interpreter.evaluate_argument(1)?.as_bool()?;
    Ok(Value::Bool(op(lhs, rhs)))
}

fn compare_float<F>(interpreter: &mut Interpreter<'_>, op: F) -> Result<Value>
where
    F: FnOnce(f64, f64) -> bool,
{
    let lhs = interpreter.evaluate_argument(0)?.as_float()?;
    let rhs = interpreter.evaluate_argument(1)?.as_float()?;
    Ok(Value::Bool(op(lhs, rhs)))
}

/// Declares a stateless function primitive backed by one of the helpers above.
macro_rules! function_primitive {
    ($(#[$doc:meta])* $type:ident, $name:literal, $arity:literal, $ret:expr, $arg:expr, |$interp:ident| $body:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $type;

        impl Primitive for $type {
            fn name(&self) -> &str {
                $name
            }

            fn arity(&self) -> usize {
                $arity
            }

            fn return_type(&self) -> ValueType {
                $ret
            }

            fn arg_type(&self, _index: usize) -> ValueType {
                $arg
            }

            fn execute(&self, $interp: &mut Interpreter<'_>) -> Result<Value> {
                $body
            }
        }
    };
}

function_primitive!(
    /// `x + y`.
    Add, "+", 2, ValueType::Float, ValueType::Float,
    |interpreter| binary_float(interpreter, |x, y| x + y)
);

function_primitive!(
    /// `x - y`.
    Subtract, "-", 2, ValueType::Float, ValueType::Float,
    |interpreter| binary_float(interpreter, |x, y| x - y)
);

function_primitive!(
    /// `x * y`.
    Multiply, "*", 2, ValueType::Float, ValueType::Float,
    |interpreter| binary_float(interpreter, |x, y| x * y)
);

function_primitive!(
    /// Protected division: returns 1 when the denominator is close to zero.
    Divide, "/", 2, ValueType::Float, ValueType::Float,
    |interpreter| binary_float(interpreter, |x, y| if y.abs() < 0.001 { 1.0 } else { x / y })
);

function_primitive!(
    Sin, "SIN", 1, ValueType::Float, ValueType::Float,
    |interpreter| unary_float(interpreter, f64::sin)
);

function_primitive!(
    Cos, "COS", 1, ValueType::Float, ValueType::Float,
    |interpreter| unary_float(interpreter, f64::cos)
);

function_primitive!(
    Exp, "EXP", 1, ValueType::Float, ValueType::Float,
    |interpreter| unary_float(interpreter, f64::exp)
);

function_primitive!(
    /// Protected logarithm of `|x|`, 0 for a null argument.
    Log, "LOG", 1, ValueType::Float, ValueType::Float,
    |interpreter| unary_float(interpreter, |x| if x == 0.0 { 0.0 } else { x.abs().ln() })
);

function_primitive!(
    And, "AND", 2, ValueType::Bool, ValueType::Bool,
    |interpreter| binary_bool(interpreter, |x, y| x && y)
);

function_primitive!(
    Or, "OR", 2, ValueType::Bool, ValueType::Bool,
    |interpreter| binary_bool(interpreter, |x, y| x || y)
);

function_primitive!(
    Xor, "XOR", 2, ValueType::Bool, ValueType::Bool,
    |interpreter| binary_bool(interpreter, |x, y| x ^ y)
);

function_primitive!(
    Nand, "NAND", 2, ValueType::Bool, ValueType::Bool,
    |interpreter| binary_bool(interpreter, |x, y| !(x && y))
);

function_primitive!(
    Nor, "NOR", 2, ValueType::Bool, ValueType::Bool,
    |interpreter| binary_bool(interpreter, |x, y| !(x || y))
);

function_primitive!(
    Not, "NOT", 1, ValueType::Bool, ValueType::Bool,
    |interpreter| Ok(Value::Bool(!interpreter.evaluate_argument(0)?.as_bool()?))
);

function_primitive!(
    Lesser, "LT", 2, ValueType::Bool, ValueType::Float,
    |interpreter| compare_float(interpreter, |x, y| x < y)
);

function_primitive!(
    Greater, "GT", 2, ValueType::Bool, ValueType::Float,
    |interpreter| compare_float(interpreter, |x, y| x > y)
);

function_primitive!(
    EqualTo, "EQ", 2, ValueType::Bool, ValueType::Float,
    |interpreter| compare_float(interpreter, |x, y| x == y)
);

/// `if c then a else b`; only the selected branch is executed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfThenElse {
    branch_type: ValueType,
}

impl IfThenElse {
    pub fn new(branch_type: ValueType) -> Self {
        Self { branch_type }
    }
}

impl Primitive for IfThenElse {
    fn name(&self) -> &str {
        "IFTE"
    }

    fn arity(&self) -> usize {
        3
    }

    fn return_type(&self) -> ValueType {
        self.branch_type
    }

    fn arg_type(&self, index: usize) -> ValueType {
        if index == 0 {
            ValueType::Bool
        } else {
            self.branch_type
        }
    }

    fn execute(&self, interpreter: &mut Interpreter<'_>) -> Result<Value> {
        if interpreter.evaluate_argument(0)?.as_bool()? {
            interpreter.evaluate_argument(1)
        } else {
            interpreter.evaluate_argument(2)
        }
    }
}

/// Terminal reading a value bound by the evaluator with
/// [`Interpreter::set_variable`].
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    value_type: ValueType,
}

impl Variable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type: ValueType::Any,
        }
    }

    pub fn typed(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
        }
    }
}

impl Primitive for Variable {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        0
    }

    fn return_type(&self) -> ValueType {
        self.value_type
    }

    fn execute(&self, interpreter: &mut Interpreter<'_>) -> Result<Value> {
        interpreter.variable(&self.name)
    }
}

/// Named constant terminal.
#[derive(Debug, Clone)]
pub struct Token {
    name: String,
    value: Value,
}

impl Token {
    pub fn new(name: &str, value: Value) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

impl Primitive for Token {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        0
    }

    fn return_type(&self) -> ValueType {
        self.value.value_type()
    }

    fn execute(&self, _interpreter: &mut Interpreter<'_>) -> Result<Value> {
        Ok(self.value)
    }
}

/// Ephemeral random constant drawn uniformly from `[low, high)`.
///
/// The instance registered in a primitive set is a generator without a value;
/// every placement spawns an instance holding its own constant.
#[derive(Debug, Clone)]
pub struct EphemeralDouble {
    name: String,
    low: f64,
    high: f64,
    value: Option<f64>,
}

impl EphemeralDouble {
    pub fn new(name: &str, low: f64, high: f64) -> Self {
        Self {
            name: name.to_string(),
            low,
            high,
            value: None,
        }
    }

    fn with_value(&self, value: f64) -> Self {
        Self {
            value: Some(value),
            ..self.clone()
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Primitive for EphemeralDouble {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        0
    }

    fn return_type(&self) -> ValueType {
        ValueType::Float
    }

    fn execute(&self, _interpreter: &mut Interpreter<'_>) -> Result<Value> {
        self.value.map(Value::Float).ok_or_else(|| {
            BeagleError::Execution(format!(
                "ephemeral `{}` executed without a generated value",
                self.name
            ))
        })
    }

    fn spawn(
        &self,
        _scope: &SelectionScope<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Arc<dyn Primitive>> {
        Some(Arc::new(self.with_value(rng.roll_uniform(self.low, self.high))))
    }

    fn parameter(&self) -> Option<Value> {
        self.value.map(Value::Float)
    }

    fn instantiate(
        &self,
        parameter: Option<&Value>,
        _arity: usize,
    ) -> Result<Option<Arc<dyn Primitive>>> {
        match parameter {
            Some(value) => Ok(Some(Arc::new(self.with_value(value.as_float().map_err(
                |_| {
                    BeagleError::Format(format!(
                        "ephemeral `{}` expects a numeric value, found `{}`",
                        self.name, value
                    ))
                },
            )?)))),
            None => Err(BeagleError::Format(format!(
                "ephemeral `{}` is missing its value",
                self.name
            ))),
        }
    }
}

/// Reference to an argument of the enclosing ADF or module call.
#[derive(Debug, Clone)]
pub struct Argument {
    index: usize,
    value_type: ValueType,
    name: String,
}

impl Argument {
    pub const PREFIX: &'static str = "ARG";

    pub fn new(index: usize) -> Self {
        Self::typed(index, ValueType::Any)
    }

    pub fn typed(index: usize, value_type: ValueType) -> Self {
        Self {
            index,
            value_type,
            name: format!("{}{}", Self::PREFIX, index),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// One reference per index in `0..count`.
    pub fn all(count: usize) -> Vec<Arc<dyn Primitive>> {
        (0..count)
            .map(|index| Arc::new(Argument::new(index)) as Arc<dyn Primitive>)
            .collect()
    }
}

impl Primitive for Argument {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        0
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Argument(self.index)
    }

    fn return_type(&self) -> ValueType {
        self.value_type
    }

    fn execute(&self, interpreter: &mut Interpreter<'_>) -> Result<Value> {
        interpreter.argument_value(self.index)
    }

    fn validate(&self, tree: &Tree, context: &Context) -> bool {
        self.index < tree.number_arguments() && context.call_stack().len() > 1
    }

    fn is_usable(&self, scope: &SelectionScope<'_>) -> bool {
        self.index < scope.number_arguments
    }

    fn signature(&self) -> Vec<ValueType> {
        match self.value_type {
            ValueType::Any => Vec::new(),
            value_type => vec![value_type],
        }
    }

    fn with_signature(&self, signature: &[ValueType]) -> Result<Option<Arc<dyn Primitive>>> {
        match signature {
            [] => Ok(None),
            [value_type] => Ok(Some(Arc::new(Argument::typed(self.index, *value_type)))),
            _ => Err(BeagleError::Format(format!(
                "argument `{}` takes one type, found {:?}",
                self.name, signature
            ))),
        }
    }
}

/// Call into another tree of the same individual.
#[derive(Debug, Clone)]
pub struct AdfInvoker {
    tree_index: usize,
    arity: usize,
    return_type: ValueType,
    name: String,
}

impl AdfInvoker {
    pub const PREFIX: &'static str = "ADF";

    /// Invoker of the tree at `tree_index`; its arity is taken from the
    /// called tree when the invoker is placed.
    pub fn new(tree_index: usize) -> Self {
        Self {
            tree_index,
            arity: 0,
            return_type: ValueType::Any,
            name: format!("{}{}", Self::PREFIX, tree_index),
        }
    }

    pub fn with_return_type(mut self, return_type: ValueType) -> Self {
        self.return_type = return_type;
        self
    }

    fn with_arity(&self, arity: usize) -> Self {
        Self {
            arity,
            ..self.clone()
        }
    }
}

impl Primitive for AdfInvoker {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Adf(self.tree_index)
    }

    fn return_type(&self) -> ValueType {
        self.return_type
    }

    fn execute(&self, interpreter: &mut Interpreter<'_>) -> Result<Value> {
        interpreter.invoke(TreeLocation::Tree(self.tree_index), self.arity)
    }

    /// Calls may only target trees with a higher index, which rules out
    /// recursion, and must match the callee's argument count.
    fn validate(&self, _tree: &Tree, context: &Context) -> bool {
        self.tree_index > context.tree_index()
            && context.tree_arguments().get(self.tree_index) == Some(&self.arity)
    }

    fn is_usable(&self, scope: &SelectionScope<'_>) -> bool {
        self.tree_index < scope.tree_arguments.len()
    }

    fn spawn(
        &self,
        scope: &SelectionScope<'_>,
        _rng: &mut RandomNumberGenerator,
    ) -> Option<Arc<dyn Primitive>> {
        let arity = scope.tree_arguments.get(self.tree_index).copied()?;
        Some(Arc::new(self.with_arity(arity)))
    }

    fn instantiate(
        &self,
        parameter: Option<&Value>,
        arity: usize,
    ) -> Result<Option<Arc<dyn Primitive>>> {
        if let Some(value) = parameter {
            return Err(BeagleError::Format(format!(
                "invoker `{}` takes no parameter, found `{}`",
                self.name(),
                value
            )));
        }
        Ok(Some(Arc::new(self.with_arity(arity))))
    }
}

/// Call into a module of the population-wide module vector.
///
/// Module invokers are only created by module compression and restored by
/// persistence; they are never drawn from a primitive set.
#[derive(Debug, Clone)]
pub struct ModuleInvoker {
    index: usize,
    arity: usize,
    return_type: ValueType,
    arg_types: Vec<ValueType>,
}

impl ModuleInvoker {
    pub const NAME: &'static str = "MODULE";

    pub fn new(index: usize, return_type: ValueType, arg_types: Vec<ValueType>) -> Self {
        Self {
            index,
            arity: arg_types.len(),
            return_type,
            arg_types,
        }
    }

    pub(crate) fn template() -> Self {
        Self::new(0, ValueType::Any, Vec::new())
    }

    pub fn module_index(&self) -> usize {
        self.index
    }
}

impl Primitive for ModuleInvoker {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Module(self.index)
    }

    fn return_type(&self) -> ValueType {
        self.return_type
    }

    fn arg_type(&self, index: usize) -> ValueType {
        self.arg_types.get(index).copied().unwrap_or_default()
    }

    fn execute(&self, interpreter: &mut Interpreter<'_>) -> Result<Value> {
        interpreter.invoke(TreeLocation::Module(self.index), self.arity)
    }

    fn validate(&self, _tree: &Tree, context: &Context) -> bool {
        context
            .modules()
            .get(self.index)
            .map(|module| module.number_arguments() == self.arity)
            .unwrap_or(false)
    }

    fn is_usable(&self, _scope: &SelectionScope<'_>) -> bool {
        false
    }

    fn parameter(&self) -> Option<Value> {
        Some(Value::Int(self.index as i64))
    }

    fn instantiate(
        &self,
        parameter: Option<&Value>,
        arity: usize,
    ) -> Result<Option<Arc<dyn Primitive>>> {
        let index = parameter
            .and_then(|value| value.as_int().ok())
            .and_then(|index| usize::try_from(index).ok())
            .ok_or_else(|| {
                BeagleError::Format(format!(
                    "module invoker needs a non-negative integer index, found {:?}",
                    parameter
                ))
            })?;
        Ok(Some(Arc::new(ModuleInvoker::new(
            index,
            ValueType::Any,
            vec![ValueType::Any; arity],
        ))))
    }

    fn signature(&self) -> Vec<ValueType> {
        std::iter::once(self.return_type)
            .chain(self.arg_types.iter().copied())
            .collect()
    }

    fn with_signature(&self, signature: &[ValueType]) -> Result<Option<Arc<dyn Primitive>>> {
        match signature {
            [] => Ok(None),
            [return_type, arg_types @ ..] if arg_types.len() == self.arity => Ok(Some(Arc::new(
                ModuleInvoker::new(self.index, *return_type, arg_types.to_vec()),
            ))),
            _ => Err(BeagleError::Format(format!(
                "module invoker with {} arguments cannot take signature {:?}",
                self.arity, signature
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_arities() {
        assert_eq!(Add.name(), "+");
        assert_eq!(Divide.arity(), 2);
        assert_eq!(Not.arity(), 1);
        assert_eq!(IfThenElse::new(ValueType::Float).arity(), 3);
        assert_eq!(IfThenElse::new(ValueType::Float).arg_type(0), ValueType::Bool);
        assert_eq!(Lesser.return_type(), ValueType::Bool);
        assert_eq!(Argument::new(2).name(), "ARG2");
        assert_eq!(AdfInvoker::new(1).name(), "ADF1");
        assert_eq!(Argument::new(1).kind(), PrimitiveKind::Argument(1));
    }

    #[test]
    fn test_ephemeral_instances_own_their_value() {
        let generator = EphemeralDouble::new("E", 0.0, 1.0);
        assert!(generator.parameter().is_none());
        let mut rng = RandomNumberGenerator::from_seed(3);
        let scope = SelectionScope::default();
        let first = generator.spawn(&scope, &mut rng).unwrap();
        let value = first.parameter().unwrap().as_float().unwrap();
        assert!((0.0..1.0).contains(&value));

        let restored = generator
            .instantiate(Some(&Value::Float(0.25)), 0)
            .unwrap()
            .unwrap();
        assert_eq!(restored.parameter(), Some(Value::Float(0.25)));
        assert!(generator.instantiate(None, 0).is_err());
        assert!(generator.instantiate(Some(&Value::Bool(true)), 0).is_err());
    }

    #[test]
    fn test_argument_usable_only_within_scope() {
        let argument = Argument::new(1);
        assert!(!argument.is_usable(&SelectionScope::new(1, &[])));
        assert!(argument.is_usable(&SelectionScope::new(2, &[])));
    }

    #[test]
    fn test_module_invoker_instantiation() {
        let template = ModuleInvoker::template();
        let invoker = template
            .instantiate(Some(&Value::Int(4)), 2)
            .unwrap()
            .unwrap();
        assert_eq!(invoker.kind(), PrimitiveKind::Module(4));
        assert_eq!(invoker.arity(), 2);
        assert!(template.instantiate(None, 2).is_err());
        assert!(template.instantiate(Some(&Value::Int(-1)), 2).is_err());
    }

    #[test]
    fn test_signatures_rebuild_node_types() {
        let argument = Argument::new(1)
            .with_signature(&[ValueType::Float])
            .unwrap()
            .unwrap();
        assert_eq!(argument.return_type(), ValueType::Float);
        assert_eq!(argument.signature(), vec![ValueType::Float]);
        assert!(Argument::new(1).signature().is_empty());
        assert!(Argument::new(1).with_signature(&[]).unwrap().is_none());

        let invoker = ModuleInvoker::new(2, ValueType::Any, vec![ValueType::Any; 2]);
        let typed = invoker
            .with_signature(&[ValueType::Bool, ValueType::Float, ValueType::Int])
            .unwrap()
            .unwrap();
        assert_eq!(typed.return_type(), ValueType::Bool);
        assert_eq!(typed.arg_type(1), ValueType::Int);
        assert_eq!(typed.kind(), PrimitiveKind::Module(2));
        assert!(invoker.with_signature(&[ValueType::Bool]).is_err());
        assert!(Add.with_signature(&[ValueType::Float]).is_err());
    }

    #[test]
    fn test_stateless_primitives_reject_parameters() {
        assert!(Add.instantiate(Some(&Value::Float(1.0)), 2).is_err());
        assert!(Add.instantiate(None, 2).unwrap().is_none());
    }
}
