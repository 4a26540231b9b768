//! # Primitive
//!
//! A primitive gives a node its behaviour. The framework only needs to know
//! which of a closed set of kinds a primitive belongs to (see
//! [`PrimitiveKind`]); what it computes is up to the implementor.
//!
//! Most primitives are stateless and shared between every node that uses
//! them. Primitives carrying per-node state, ephemeral constants and
//! invokers, produce a fresh instance from [`Primitive::spawn`] every time
//! they are placed into a tree, so no two nodes alias the same value.
//!
//! ## Example
//!
//! ```rust
//! use beagle::error::Result;
//! use beagle::gp::{Interpreter, Primitive, Value, ValueType};
//!
//! #[derive(Debug)]
//! struct Square;
//!
//! impl Primitive for Square {
//!     fn name(&self) -> &str {
//!         "SQR"
//!     }
//!
//!     fn arity(&self) -> usize {
//!         1
//!     }
//!
//!     fn return_type(&self) -> ValueType {
//!         ValueType::Float
//!     }
//!
//!     fn execute(&self, interpreter: &mut Interpreter<'_>) -> Result<Value> {
//!         let x = interpreter.evaluate_argument(0)?.as_float()?;
//!         Ok(Value::Float(x * x))
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{BeagleError, Result};
use crate::gp::context::Context;
use crate::gp::interpreter::Interpreter;
use crate::gp::tree::Tree;
use crate::gp::value::{Value, ValueType};
use crate::rng::RandomNumberGenerator;

/// Closed classification of primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Zero-arity leaf: variable, token or ephemeral constant.
    Terminal,
    /// Fixed-arity operation on its children.
    Function,
    /// Reference to the argument with this index of the enclosing call.
    Argument(usize),
    /// Call into the tree with this index of the same individual.
    Adf(usize),
    /// Call into the module stored at this slot of the module vector.
    Module(usize),
}

impl PrimitiveKind {
    pub fn is_invoker(&self) -> bool {
        matches!(self, PrimitiveKind::Adf(_) | PrimitiveKind::Module(_))
    }
}

/// What a primitive may depend on when it is selected for a new node.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionScope<'s> {
    /// Number of arguments of the tree being built.
    pub number_arguments: usize,
    /// Number of arguments of each tree of the individual, by tree index.
    pub tree_arguments: &'s [usize],
}

impl<'s> SelectionScope<'s> {
    pub fn new(number_arguments: usize, tree_arguments: &'s [usize]) -> Self {
        Self {
            number_arguments,
            tree_arguments,
        }
    }
}

/// Behaviour of a tree node.
pub trait Primitive: fmt::Debug + Send + Sync {
    /// Name used for persistence, mutation targeting and display.
    fn name(&self) -> &str;

    /// Number of children.
    fn arity(&self) -> usize;

    fn kind(&self) -> PrimitiveKind {
        if self.arity() == 0 {
            PrimitiveKind::Terminal
        } else {
            PrimitiveKind::Function
        }
    }

    fn return_type(&self) -> ValueType {
        ValueType::Any
    }

    /// Type expected from the child at `index`.
    fn arg_type(&self, _index: usize) -> ValueType {
        ValueType::Any
    }

    /// Executes the node currently on top of the interpreter's call stack.
    fn execute(&self, interpreter: &mut Interpreter<'_>) -> Result<Value>;

    /// Checks that the node on top of `context`'s call stack may hold this
    /// primitive. Type compatibility with the parent is checked by the tree.
    fn validate(&self, _tree: &Tree, _context: &Context) -> bool {
        true
    }

    /// Whether the primitive may be selected in `scope`.
    fn is_usable(&self, _scope: &SelectionScope<'_>) -> bool {
        true
    }

    /// Produces a node-owned instance, or `None` when the shared instance
    /// should be used.
    fn spawn(
        &self,
        _scope: &SelectionScope<'_>,
        _rng: &mut RandomNumberGenerator,
    ) -> Option<Arc<dyn Primitive>> {
        None
    }

    /// Per-node payload written by persistence.
    fn parameter(&self) -> Option<Value> {
        None
    }

    /// Rebuilds a node-owned instance from a persisted payload and the number
    /// of children found in the document. `Ok(None)` keeps the shared instance.
    fn instantiate(
        &self,
        parameter: Option<&Value>,
        _arity: usize,
    ) -> Result<Option<Arc<dyn Primitive>>> {
        match parameter {
            Some(value) => Err(BeagleError::Format(format!(
                "primitive `{}` takes no parameter, found `{}`",
                self.name(),
                value
            ))),
            None => Ok(None),
        }
    }

    /// Type tags of a node-owned instance typed at creation rather than by
    /// its primitive set: return type first, then argument types. Empty for
    /// every other primitive.
    fn signature(&self) -> Vec<ValueType> {
        Vec::new()
    }

    /// Rebuilds this instance with a persisted `signature`. `Ok(None)` keeps
    /// the instance as it is.
    fn with_signature(&self, signature: &[ValueType]) -> Result<Option<Arc<dyn Primitive>>> {
        if signature.is_empty() {
            Ok(None)
        } else {
            Err(BeagleError::Format(format!(
                "primitive `{}` takes no type signature, found {:?}",
                self.name(),
                signature
            )))
        }
    }
}

/// Returns the instance to place into a node: a spawned one when the
/// primitive owns per-node state, the shared one otherwise.
pub fn place(
    primitive: &Arc<dyn Primitive>,
    scope: &SelectionScope<'_>,
    rng: &mut RandomNumberGenerator,
) -> Arc<dyn Primitive> {
    primitive
        .spawn(scope, rng)
        .unwrap_or_else(|| Arc::clone(primitive))
}
