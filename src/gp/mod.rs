//! Genetic programming: expression trees, their interpreter, and the
//! structural operators that create and vary them.

pub mod context;
pub mod crossover;
pub mod ema;
pub mod individual;
pub mod init;
pub mod interpreter;
pub mod module;
pub mod mutation;
pub mod persistence;
pub mod primitive;
pub mod primitive_set;
pub mod primitives;
pub mod tree;
pub mod value;

pub use context::{Context, ExecutionLimits};
pub use crossover::CrossoverOp;
pub use ema::EmaOp;
pub use individual::Individual;
pub use init::{InitConfig, InitMethod, InitializationOp};
pub use interpreter::{Interpreter, TreeLocation};
pub use module::ModuleVector;
pub use mutation::MutationOp;
pub use primitive::{Primitive, PrimitiveKind, SelectionScope};
pub use primitive_set::{ArgumentStrategy, NodeCategory, PrimitiveSet, PrimitiveSuperSet};
pub use tree::{Node, Tree};
pub use value::{Value, ValueType};
