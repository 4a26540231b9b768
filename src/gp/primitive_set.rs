//! # Primitive sets
//!
//! A [`PrimitiveSet`] is the catalogue a tree draws its nodes from, with a
//! selection weight per primitive. Individuals with ADFs use one set per tree
//! index, gathered in a [`PrimitiveSuperSet`].
//!
//! The set also decides how argument references inside trees bound to it are
//! evaluated when the tree is called as an ADF or module (see
//! [`ArgumentStrategy`]).

use std::sync::Arc;

use crate::error::{BeagleError, Result};
use crate::gp::primitive::{place, Primitive, SelectionScope};
use crate::gp::primitives::{Argument, ModuleInvoker};
use crate::gp::value::ValueType;
use crate::rng::RandomNumberGenerator;

/// How the arguments of a call into a tree bound to this set are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArgumentStrategy {
    /// Every access re-executes the caller's subtree.
    JustInTime,
    /// The first access per call executes the caller's subtree and keeps the value.
    #[default]
    Caching,
    /// All arguments are executed before the callee body runs.
    Precompute,
}

/// Which nodes a selection may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    /// Zero-arity primitives only.
    Leaf,
    /// Primitives taking at least one child.
    Branch,
    Any,
}

#[derive(Debug, Clone)]
struct Entry {
    primitive: Arc<dyn Primitive>,
    weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PrimitiveSet {
    entries: Vec<Entry>,
    root_type: ValueType,
    argument_strategy: ArgumentStrategy,
}

impl PrimitiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the type the root of every tree bound to this set must return.
    pub fn with_root_type(mut self, root_type: ValueType) -> Self {
        self.root_type = root_type;
        self
    }

    pub fn with_argument_strategy(mut self, strategy: ArgumentStrategy) -> Self {
        self.argument_strategy = strategy;
        self
    }

    /// Adds a primitive with selection weight 1.
    pub fn insert(&mut self, primitive: Arc<dyn Primitive>) -> Result<()> {
        self.insert_weighted(primitive, 1.0)
    }

    /// Adds a primitive with the given selection weight.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for duplicate names and for negative or
    /// non-finite weights.
    pub fn insert_weighted(&mut self, primitive: Arc<dyn Primitive>, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(BeagleError::Configuration(format!(
                "invalid selection weight {} for primitive `{}`",
                weight,
                primitive.name()
            )));
        }
        if self.get(primitive.name()).is_some() {
            return Err(BeagleError::Configuration(format!(
                "primitive `{}` is already in the set",
                primitive.name()
            )));
        }
        self.entries.push(Entry { primitive, weight });
        Ok(())
    }

    /// Builder-style variant of [`PrimitiveSet::insert`].
    pub fn with(mut self, primitive: Arc<dyn Primitive>) -> Result<Self> {
        self.insert(primitive)?;
        Ok(self)
    }

    pub fn root_type(&self) -> ValueType {
        self.root_type
    }

    pub fn argument_strategy(&self) -> ArgumentStrategy {
        self.argument_strategy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn primitives(&self) -> impl Iterator<Item = &Arc<dyn Primitive>> {
        self.entries.iter().map(|entry| &entry.primitive)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Primitive>> {
        self.entries
            .iter()
            .find(|entry| entry.primitive.name() == name)
            .map(|entry| &entry.primitive)
    }

    /// Looks a primitive up by name, falling back to the argument references
    /// and module invoker that module trees use without declaring them.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Primitive>> {
        if let Some(primitive) = self.get(name) {
            return Some(Arc::clone(primitive));
        }
        if name == ModuleInvoker::NAME {
            return Some(Arc::new(ModuleInvoker::template()));
        }
        name.strip_prefix(Argument::PREFIX)
            .and_then(|index| index.parse::<usize>().ok())
            .map(|index| Arc::new(Argument::new(index)) as Arc<dyn Primitive>)
    }

    /// Draws a primitive of `category` whose return type fits `return_type`,
    /// weighted by selection weight, and returns the instance to place in a node.
    pub fn select(
        &self,
        category: NodeCategory,
        return_type: ValueType,
        scope: &SelectionScope<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Arc<dyn Primitive>> {
        self.select_where(scope, rng, |primitive, arity| {
            let category_matches = match category {
                NodeCategory::Leaf => arity == 0,
                NodeCategory::Branch => arity > 0,
                NodeCategory::Any => true,
            };
            category_matches && primitive.return_type().is_compatible_with(return_type)
        })
    }

    /// Weighted draw among usable primitives accepted by `filter`, which
    /// receives each primitive with its arity in `scope`.
    pub fn select_where<F>(
        &self,
        scope: &SelectionScope<'_>,
        rng: &mut RandomNumberGenerator,
        filter: F,
    ) -> Option<Arc<dyn Primitive>>
    where
        F: Fn(&dyn Primitive, usize) -> bool,
    {
        let candidates: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|entry| entry.weight > 0.0 && entry.primitive.is_usable(scope))
            .filter(|entry| {
                let arity = scoped_arity(entry.primitive.as_ref(), scope);
                filter(entry.primitive.as_ref(), arity)
            })
            .collect();
        let weights: Vec<f64> = candidates.iter().map(|entry| entry.weight).collect();
        let chosen = rng.roll_weighted(&weights)?;
        Some(place(&candidates[chosen].primitive, scope, rng))
    }

    /// Whether at least one usable primitive of `category` fits `return_type`.
    pub fn has_category(
        &self,
        category: NodeCategory,
        return_type: ValueType,
        scope: &SelectionScope<'_>,
    ) -> bool {
        self.entries.iter().any(|entry| {
            let arity = scoped_arity(entry.primitive.as_ref(), scope);
            let category_matches = match category {
                NodeCategory::Leaf => arity == 0,
                NodeCategory::Branch => arity > 0,
                NodeCategory::Any => true,
            };
            entry.weight > 0.0
                && entry.primitive.is_usable(scope)
                && category_matches
                && entry.primitive.return_type().is_compatible_with(return_type)
        })
    }
}

/// Arity a primitive will have once placed in `scope`. ADF invokers take the
/// argument count of the tree they call.
fn scoped_arity(primitive: &dyn Primitive, scope: &SelectionScope<'_>) -> usize {
    match primitive.kind() {
        crate::gp::primitive::PrimitiveKind::Adf(tree_index) => scope
            .tree_arguments
            .get(tree_index)
            .copied()
            .unwrap_or_else(|| primitive.arity()),
        _ => primitive.arity(),
    }
}

/// One primitive set per tree index.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveSuperSet {
    sets: Vec<PrimitiveSet>,
}

impl PrimitiveSuperSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(mut self, set: PrimitiveSet) -> Self {
        self.sets.push(set);
        self
    }

    pub fn push(&mut self, set: PrimitiveSet) -> usize {
        self.sets.push(set);
        self.sets.len() - 1
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&PrimitiveSet> {
        self.sets.get(index).ok_or_else(|| {
            BeagleError::Configuration(format!(
                "no primitive set with index {} ({} sets available)",
                index,
                self.sets.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::primitives::{Add, AdfInvoker, EphemeralDouble, Token, Variable};
    use crate::gp::value::Value;

    fn arithmetic_set() -> PrimitiveSet {
        let mut set = PrimitiveSet::new();
        set.insert(Arc::new(Add)).unwrap();
        set.insert(Arc::new(Variable::new("X"))).unwrap();
        set.insert(Arc::new(Token::new("ONE", Value::Float(1.0)))).unwrap();
        set
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut set = arithmetic_set();
        assert!(set.insert(Arc::new(Add)).is_err());
        assert!(set
            .insert_weighted(Arc::new(Variable::new("Y")), -1.0)
            .is_err());
    }

    #[test]
    fn test_select_respects_category() {
        let set = arithmetic_set();
        let mut rng = RandomNumberGenerator::from_seed(9);
        let scope = SelectionScope::default();
        for _ in 0..20 {
            let leaf = set
                .select(NodeCategory::Leaf, ValueType::Any, &scope, &mut rng)
                .unwrap();
            assert_eq!(leaf.arity(), 0);
            let branch = set
                .select(NodeCategory::Branch, ValueType::Any, &scope, &mut rng)
                .unwrap();
            assert_eq!(branch.name(), "+");
        }
    }

    #[test]
    fn test_select_respects_type() {
        let set = arithmetic_set();
        let mut rng = RandomNumberGenerator::from_seed(10);
        let scope = SelectionScope::default();
        assert!(set
            .select(NodeCategory::Leaf, ValueType::Bool, &scope, &mut rng)
            .is_none());
        assert!(!set.has_category(NodeCategory::Branch, ValueType::Bool, &scope));
        assert!(set.has_category(NodeCategory::Leaf, ValueType::Float, &scope));
    }

    #[test]
    fn test_select_spawns_ephemerals() {
        let mut set = PrimitiveSet::new();
        set.insert(Arc::new(EphemeralDouble::new("E", -1.0, 1.0)))
            .unwrap();
        let mut rng = RandomNumberGenerator::from_seed(11);
        let scope = SelectionScope::default();
        let a = set
            .select(NodeCategory::Leaf, ValueType::Any, &scope, &mut rng)
            .unwrap();
        let b = set
            .select(NodeCategory::Leaf, ValueType::Any, &scope, &mut rng)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.parameter().is_some());
    }

    #[test]
    fn test_adf_arity_follows_scope() {
        let mut set = PrimitiveSet::new();
        set.insert(Arc::new(AdfInvoker::new(1))).unwrap();
        set.insert(Arc::new(Variable::new("X"))).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(12);

        let arguments = [0, 2];
        let scope = SelectionScope::new(0, &arguments);
        let branch = set
            .select(NodeCategory::Branch, ValueType::Any, &scope, &mut rng)
            .unwrap();
        assert_eq!(branch.name(), "ADF1");
        assert_eq!(branch.arity(), 2);

        // Without a second tree the invoker cannot be used.
        let scope = SelectionScope::new(0, &arguments[..1]);
        assert!(set
            .select(NodeCategory::Branch, ValueType::Any, &scope, &mut rng)
            .is_none());
    }

    #[test]
    fn test_resolve_builtin_references() {
        let set = arithmetic_set();
        assert_eq!(set.resolve("ARG3").unwrap().name(), "ARG3");
        assert_eq!(set.resolve("MODULE").unwrap().name(), "MODULE");
        assert!(set.resolve("ARGx").is_none());
        assert!(set.resolve("unknown").is_none());
    }

    #[test]
    fn test_super_set_lookup() {
        let super_set = PrimitiveSuperSet::new().with_set(arithmetic_set());
        assert!(super_set.get(0).is_ok());
        assert!(matches!(
            super_set.get(1),
            Err(BeagleError::Configuration(_))
        ));
    }
}
