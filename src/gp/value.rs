//! Data flowing between primitives, and the type tags used to constrain
//! which primitive may sit where in a tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BeagleError, Result};

/// A datum produced by executing a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Float(_) => ValueType::Float,
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
        }
    }

    /// Numeric view of the value; integers are widened.
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(value) => Ok(*value),
            Value::Int(value) => Ok(*value as f64),
            Value::Bool(_) => Err(BeagleError::Execution(format!(
                "expected a numeric value, found {}",
                self
            ))),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(value) => Ok(*value),
            _ => Err(BeagleError::Execution(format!(
                "expected an integer value, found {}",
                self
            ))),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(value) => Ok(*value),
            _ => Err(BeagleError::Execution(format!(
                "expected a boolean value, found {}",
                self
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(value) => write!(f, "{}", value),
            Value::Int(value) => write!(f, "{}", value),
            Value::Bool(value) => write!(f, "{}", value),
        }
    }
}

/// Type tag carried by primitives for strongly-typed GP.
///
/// `Any` matches every other tag, so untyped primitive sets never reject a
/// placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    #[default]
    Any,
    Float,
    Int,
    Bool,
}

impl ValueType {
    /// Whether a primitive returning `self` may fill a slot expecting `expected`.
    pub fn is_compatible_with(self, expected: ValueType) -> bool {
        self == ValueType::Any || expected == ValueType::Any || self == expected
    }
}
