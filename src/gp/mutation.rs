//! # Mutation
//!
//! Four mutation operators working on one randomly chosen node:
//!
//! - standard: the subtree is regrown with the grow method;
//! - swap: the primitive is replaced by another of the same arity;
//! - shrink: a branch is replaced by one of its own subtrees;
//! - ephemeral: an ephemeral constant draws a new value.
//!
//! Structural mutations work on a copy of the tree and only commit it once
//! the new material validates, retrying up to `gp.try` times.

use std::sync::Arc;

use tracing::debug;

use crate::breeding::Operator;
use crate::error::{BeagleError, Result};
use crate::evolution::Deme;
use crate::gp::context::Context;
use crate::gp::crossover::ATTEMPTS;
use crate::gp::individual::Individual;
use crate::gp::init::{declare_tree_parameters, Generator, MAX_TREE_DEPTH};
use crate::gp::primitive::SelectionScope;
use crate::gp::tree::Tree;
use crate::gp::value::ValueType;
use crate::register::{ParameterValue, Register};
use crate::rng::RandomNumberGenerator;

pub const STANDARD_PROBABILITY: &str = "gp.mutstd.indpb";
pub const STANDARD_MAX_DEPTH: &str = "gp.mutstd.maxdepth";
pub const SWAP_PROBABILITY: &str = "gp.mutswap.indpb";
pub const SHRINK_PROBABILITY: &str = "gp.mutshrink.indpb";
pub const EPHEMERAL_PROBABILITY: &str = "gp.mutephdbl.indpb";
pub const EPHEMERAL_PRIMITIVE: &str = "gp.mutephdbl.primit";

/// Uniformly chosen non-empty tree among those accepted by `filter`.
fn pick_tree<F>(individual: &Individual, rng: &mut RandomNumberGenerator, filter: F) -> Option<usize>
where
    F: Fn(&Tree) -> bool,
{
    let trees: Vec<usize> = individual
        .trees
        .iter()
        .enumerate()
        .filter(|(_, tree)| !tree.is_empty() && filter(tree))
        .map(|(index, _)| index)
        .collect();
    if trees.is_empty() {
        return None;
    }
    Some(trees[rng.roll_index(trees.len())])
}

/// A tree chosen by [`pick_tree`], then a node uniformly chosen in it.
fn pick_node<F>(
    individual: &Individual,
    rng: &mut RandomNumberGenerator,
    filter: F,
) -> Option<(usize, usize)>
where
    F: Fn(&Tree) -> bool,
{
    let tree = pick_tree(individual, rng, filter)?;
    let node = rng.roll_index(individual.trees[tree].len());
    Some((tree, node))
}

/// Validates `candidate` at `index` as tree `tree` of `individual` and
/// commits it on success.
fn commit_if_valid(
    individual: &mut Individual,
    tree: usize,
    candidate: Tree,
    index: usize,
    context: &mut Context,
) -> bool {
    let saved_tree_index = context.tree_index();
    context.set_tree_index(tree);
    context.set_tree_arguments(individual.tree_arguments());
    let valid = candidate.validate_at(index, context);
    context.set_tree_index(saved_tree_index);
    if valid {
        individual.trees[tree] = candidate;
    }
    valid
}

/// Regrows a random subtree.
///
/// Returns `false` without touching the individual when the chosen node
/// already lies deeper than `max_tree_depth`.
pub fn mutate_standard(
    individual: &mut Individual,
    context: &mut Context,
    max_tree_depth: usize,
    max_regen_depth: usize,
    attempts: usize,
) -> Result<bool> {
    let Some((tree_index, index)) = pick_node(individual, &mut context.rng, |_| true) else {
        return Ok(false);
    };
    let tree = &individual.trees[tree_index];
    tree.set_context_to_node(index, context)?;
    let depth = context.call_stack().len();
    context.clear_call_stack();
    if depth > max_tree_depth {
        debug!(
            depth,
            max_tree_depth, "standard mutation point lies beyond the depth limit"
        );
        return Ok(false);
    }
    let regen_depth = (max_tree_depth - depth + 1).min(max_regen_depth).max(1);

    let primitives = context.shared_primitives();
    let set = primitives.get(tree.primitive_set_index())?;
    let expected = tree.expected_type(index, context)?;
    let tree_arguments = individual.tree_arguments();
    let generator = Generator::new(
        set,
        SelectionScope::new(tree.number_arguments(), &tree_arguments),
    );

    for _ in 0..attempts {
        let mut nodes = Vec::new();
        generator.grow(&mut nodes, 1, regen_depth, expected, &mut context.rng)?;
        let mut candidate = individual.trees[tree_index].clone();
        candidate.replace_subtree(index, nodes);
        if commit_if_valid(individual, tree_index, candidate, index, context) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Replaces the primitive of a random node by another one of the same arity
/// whose types fit the parent and the existing children.
pub fn mutate_swap(
    individual: &mut Individual,
    context: &mut Context,
    attempts: usize,
) -> Result<bool> {
    let Some((tree_index, index)) = pick_node(individual, &mut context.rng, |_| true) else {
        return Ok(false);
    };
    let primitives = context.shared_primitives();
    let tree = &individual.trees[tree_index];
    let set = primitives.get(tree.primitive_set_index())?;
    let tree_arguments = individual.tree_arguments();
    let scope = SelectionScope::new(tree.number_arguments(), &tree_arguments);
    let current = Arc::clone(&tree.nodes()[index].primitive);
    let arity = current.arity();
    let expected = tree.expected_type(index, context)?;
    let child_types: Vec<ValueType> = tree
        .children(index)
        .into_iter()
        .map(|child| tree.nodes()[child].primitive.return_type())
        .collect();

    for _ in 0..attempts {
        let Some(replacement) =
            set.select_where(&scope, &mut context.rng, |primitive, scoped_arity| {
                scoped_arity == arity
                    && primitive.name() != current.name()
                    && primitive.return_type().is_compatible_with(expected)
                    && child_types
                        .iter()
                        .enumerate()
                        .all(|(position, child)| child.is_compatible_with(primitive.arg_type(position)))
            })
        else {
            return Ok(false);
        };
        let mut candidate = individual.trees[tree_index].clone();
        match candidate.node_mut(index) {
            Some(node) => node.primitive = replacement,
            None => {
                return Err(BeagleError::InvalidNode {
                    index,
                    size: candidate.len(),
                })
            }
        }
        if commit_if_valid(individual, tree_index, candidate, index, context) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Replaces a random branch by one of its children whose type fits.
pub fn mutate_shrink(
    individual: &mut Individual,
    context: &mut Context,
    attempts: usize,
) -> Result<bool> {
    let Some(tree_index) = pick_tree(individual, &mut context.rng, |tree| tree.len() > 1) else {
        return Ok(false);
    };
    let branches: Vec<usize> = individual.trees[tree_index]
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, node)| node.primitive.arity() > 0)
        .map(|(index, _)| index)
        .collect();

    for _ in 0..attempts {
        let tree = &individual.trees[tree_index];
        let branch = branches[context.rng.roll_index(branches.len())];
        let expected = tree.expected_type(branch, context)?;
        let children: Vec<usize> = tree
            .children(branch)
            .into_iter()
            .filter(|&child| {
                tree.nodes()[child]
                    .primitive
                    .return_type()
                    .is_compatible_with(expected)
            })
            .collect();
        if children.is_empty() {
            continue;
        }
        let child = children[context.rng.roll_index(children.len())];
        let mut candidate = tree.clone();
        let replacement = candidate.subtree(child).to_vec();
        candidate.replace_subtree(branch, replacement);
        if commit_if_valid(individual, tree_index, candidate, branch, context) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Draws a new value for a random node named `name`. Size and shape of the
/// tree are unchanged.
pub fn mutate_ephemeral(
    individual: &mut Individual,
    context: &mut Context,
    name: &str,
) -> Result<bool> {
    let targets: Vec<(usize, usize)> = individual
        .trees
        .iter()
        .enumerate()
        .flat_map(|(tree_index, tree)| {
            tree.nodes()
                .iter()
                .enumerate()
                .filter(|(_, node)| node.primitive.name() == name)
                .map(move |(index, _)| (tree_index, index))
        })
        .collect();
    if targets.is_empty() {
        return Ok(false);
    }
    let (tree_index, index) = targets[context.rng.roll_index(targets.len())];
    let tree_arguments = individual.tree_arguments();
    let tree = &mut individual.trees[tree_index];
    let scope = SelectionScope::new(tree.number_arguments(), &tree_arguments);
    let size = tree.len();
    let node = tree
        .node_mut(index)
        .ok_or(BeagleError::InvalidNode { index, size })?;
    match node.primitive.spawn(&scope, &mut context.rng) {
        Some(primitive) => {
            node.primitive = primitive;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MutationKind {
    Standard,
    Swap,
    Shrink,
    Ephemeral,
}

/// Mutation operators: `GP-MutationStandardOp`, `GP-MutationSwapOp`,
/// `GP-MutationShrinkOp` and `GP-MutationEphemeralOp`.
///
/// Every individual is mutated with the configured probability; mutated
/// individuals have their fitness invalidated.
#[derive(Debug, Clone)]
pub struct MutationOp {
    kind: MutationKind,
    probability_name: String,
    probability: f64,
    attempts: usize,
    max_tree_depth: usize,
    max_regen_depth: usize,
    ephemeral_name: String,
}

impl MutationOp {
    fn new(kind: MutationKind, probability_name: &str) -> Self {
        Self {
            kind,
            probability_name: probability_name.to_string(),
            probability: 0.05,
            attempts: 2,
            max_tree_depth: 17,
            max_regen_depth: 5,
            ephemeral_name: "E".to_string(),
        }
    }

    pub fn standard() -> Self {
        Self::new(MutationKind::Standard, STANDARD_PROBABILITY)
    }

    pub fn swap() -> Self {
        Self::new(MutationKind::Swap, SWAP_PROBABILITY)
    }

    pub fn shrink() -> Self {
        Self::new(MutationKind::Shrink, SHRINK_PROBABILITY)
    }

    pub fn ephemeral() -> Self {
        Self::new(MutationKind::Ephemeral, EPHEMERAL_PROBABILITY)
    }

    /// Reads the mutation probability from `name` instead of the default.
    pub fn with_probability_name(mut self, name: &str) -> Self {
        self.probability_name = name.to_string();
        self
    }

    /// Applies the mutation to one individual.
    pub fn mutate(&self, individual: &mut Individual, context: &mut Context) -> Result<bool> {
        match self.kind {
            MutationKind::Standard => mutate_standard(
                individual,
                context,
                self.max_tree_depth,
                self.max_regen_depth,
                self.attempts,
            ),
            MutationKind::Swap => mutate_swap(individual, context, self.attempts),
            MutationKind::Shrink => mutate_shrink(individual, context, self.attempts),
            MutationKind::Ephemeral => mutate_ephemeral(individual, context, &self.ephemeral_name),
        }
    }
}

impl Operator for MutationOp {
    fn name(&self) -> &str {
        match self.kind {
            MutationKind::Standard => "GP-MutationStandardOp",
            MutationKind::Swap => "GP-MutationSwapOp",
            MutationKind::Shrink => "GP-MutationShrinkOp",
            MutationKind::Ephemeral => "GP-MutationEphemeralOp",
        }
    }

    fn initialize(&mut self, register: &mut Register) -> Result<()> {
        declare_tree_parameters(register);
        register.declare(
            &self.probability_name,
            ParameterValue::Float(0.05),
            "probability that an individual is mutated",
        );
        register.declare(
            ATTEMPTS,
            ParameterValue::Int(2),
            "attempts at a valid structural change",
        );
        self.probability = register.probability(&self.probability_name)?;
        self.attempts = register.uint(ATTEMPTS)?;
        self.max_tree_depth = register.uint(MAX_TREE_DEPTH)?;
        match self.kind {
            MutationKind::Standard => {
                register.declare(
                    STANDARD_MAX_DEPTH,
                    ParameterValue::Int(5),
                    "maximum depth of regrown subtrees",
                );
                self.max_regen_depth = register.uint(STANDARD_MAX_DEPTH)?;
            }
            MutationKind::Ephemeral => {
                register.declare(
                    EPHEMERAL_PRIMITIVE,
                    ParameterValue::Text("E".to_string()),
                    "name of the ephemeral primitive to mutate",
                );
                self.ephemeral_name = register.text(EPHEMERAL_PRIMITIVE)?;
            }
            MutationKind::Swap | MutationKind::Shrink => {}
        }
        Ok(())
    }

    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()> {
        let mut mutated = 0;
        for index in 0..deme.population.len() {
            if !context.rng.flip(self.probability) {
                continue;
            }
            if self.mutate(&mut deme.population[index], context)? {
                deme.population[index].invalidate();
                mutated += 1;
            }
        }
        debug!(operator = self.name(), mutated, "mutation done");
        Ok(())
    }
}
