//! # Subtree crossover
//!
//! Two parents exchange a randomly chosen subtree of the same tree index.
//! Because subtrees are contiguous in the flattened representation, the
//! exchange is a pair of slice splices.
//!
//! The constrained variant retries up to `gp.try` times until the offspring
//! respect the type constraints, the depth limit and node validation.

use tracing::debug;

use crate::breeding::Operator;
use crate::error::Result;
use crate::evolution::Deme;
use crate::gp::context::Context;
use crate::gp::individual::Individual;
use crate::gp::init::{declare_tree_parameters, MAX_TREE_DEPTH};
use crate::gp::primitive::PrimitiveKind;
use crate::gp::tree::Node;
use crate::register::{ParameterValue, Register};
use crate::rng::RandomNumberGenerator;

pub const CROSSOVER_PROBABILITY: &str = "gp.cx.indpb";
pub const ATTEMPTS: &str = "gp.try";

/// Tree indices both parents can exchange material on.
fn matching_trees(first: &Individual, second: &Individual) -> Vec<usize> {
    first
        .trees
        .iter()
        .zip(second.trees.iter())
        .enumerate()
        .filter(|(_, (a, b))| {
            !a.is_empty()
                && !b.is_empty()
                && a.primitive_set_index() == b.primitive_set_index()
                && a.number_arguments() == b.number_arguments()
        })
        .map(|(index, _)| index)
        .collect()
}

/// Whether every ADF invoker in `nodes` calls a tree taking as many
/// arguments as the invoker passes, given the argument counts of the
/// receiving individual.
fn invokers_fit(nodes: &[Node], tree_arguments: &[usize]) -> bool {
    nodes.iter().all(|node| match node.primitive.kind() {
        PrimitiveKind::Adf(tree) => tree_arguments.get(tree) == Some(&node.primitive.arity()),
        _ => true,
    })
}

/// Swaps the subtree at `a` of `first.trees[tree]` with the subtree at `b` of
/// `second.trees[tree]`.
fn swap_subtrees(
    first: &mut Individual,
    second: &mut Individual,
    tree: usize,
    a: usize,
    b: usize,
) {
    let from_first = first.trees[tree].subtree(a).to_vec();
    let from_second = second.trees[tree].subtree(b).to_vec();
    first.trees[tree].replace_subtree(a, from_second);
    second.trees[tree].replace_subtree(b, from_first);
}

/// Plain subtree crossover with uniform node selection. Returns `false`
/// when the parents share no compatible tree, or when the chosen subtrees
/// call ADFs whose argument counts differ in the other parent.
pub fn mate(first: &mut Individual, second: &mut Individual, rng: &mut RandomNumberGenerator) -> bool {
    let trees = matching_trees(first, second);
    if trees.is_empty() {
        return false;
    }
    let tree = trees[rng.roll_index(trees.len())];
    let a = rng.roll_index(first.trees[tree].len());
    let b = rng.roll_index(second.trees[tree].len());
    if !invokers_fit(second.trees[tree].subtree(b), &first.tree_arguments())
        || !invokers_fit(first.trees[tree].subtree(a), &second.tree_arguments())
    {
        debug!(tree, "crossover rejected, ADF arities differ between parents");
        return false;
    }
    swap_subtrees(first, second, tree, a, b);
    true
}

/// Subtree crossover keeping both offspring valid and within `max_depth`.
/// Parents are left untouched when every attempt fails.
pub fn mate_constrained(
    first: &mut Individual,
    second: &mut Individual,
    context: &mut Context,
    max_depth: usize,
    attempts: usize,
) -> bool {
    let trees = matching_trees(first, second);
    if trees.is_empty() {
        return false;
    }
    let saved_tree_index = context.tree_index();
    let mut mated = false;
    for _ in 0..attempts {
        let tree = trees[context.rng.roll_index(trees.len())];
        let a = context.rng.roll_index(first.trees[tree].len());
        let b = context.rng.roll_index(second.trees[tree].len());

        let mut first_tree = first.trees[tree].clone();
        let mut second_tree = second.trees[tree].clone();
        let from_first = first_tree.subtree(a).to_vec();
        let from_second = second_tree.subtree(b).to_vec();
        first_tree.replace_subtree(a, from_second);
        second_tree.replace_subtree(b, from_first);
        if first_tree.depth() > max_depth || second_tree.depth() > max_depth {
            continue;
        }

        context.set_tree_index(tree);
        context.set_tree_arguments(first.tree_arguments());
        if !first_tree.validate_at(a, context) {
            continue;
        }
        context.set_tree_arguments(second.tree_arguments());
        if !second_tree.validate_at(b, context) {
            continue;
        }

        first.trees[tree] = first_tree;
        second.trees[tree] = second_tree;
        mated = true;
        break;
    }
    context.set_tree_index(saved_tree_index);
    mated
}

/// Mutable references to two distinct elements.
pub(crate) fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(i, j);
    if i < j {
        let (head, tail) = items.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

/// `GP-CrossoverOp` and `GP-CrossoverConstrainedOp`.
///
/// Each individual takes part in mating with the configured probability;
/// participants are shuffled and mated in pairs. Mated offspring have their
/// fitness invalidated.
#[derive(Debug, Clone)]
pub struct CrossoverOp {
    constrained: bool,
    probability_name: String,
    probability: f64,
    attempts: usize,
    max_depth: usize,
}

impl CrossoverOp {
    pub fn new() -> Self {
        Self {
            constrained: false,
            probability_name: CROSSOVER_PROBABILITY.to_string(),
            probability: 0.9,
            attempts: 2,
            max_depth: 17,
        }
    }

    pub fn constrained() -> Self {
        Self {
            constrained: true,
            ..Self::new()
        }
    }

    /// Reads the mating probability from `name` instead of `gp.cx.indpb`.
    /// Several operators may share one name.
    pub fn with_probability_name(mut self, name: &str) -> Self {
        self.probability_name = name.to_string();
        self
    }
}

impl Default for CrossoverOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for CrossoverOp {
    fn name(&self) -> &str {
        if self.constrained {
            "GP-CrossoverConstrainedOp"
        } else {
            "GP-CrossoverOp"
        }
    }

    fn initialize(&mut self, register: &mut Register) -> Result<()> {
        declare_tree_parameters(register);
        register.declare(
            &self.probability_name,
            ParameterValue::Float(0.9),
            "probability that an individual takes part in crossover",
        );
        register.declare(
            ATTEMPTS,
            ParameterValue::Int(2),
            "attempts at a valid constrained crossover",
        );
        self.probability = register.probability(&self.probability_name)?;
        self.attempts = register.uint(ATTEMPTS)?;
        self.max_depth = register.uint(MAX_TREE_DEPTH)?;
        Ok(())
    }

    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()> {
        let mut participants: Vec<usize> = (0..deme.population.len())
            .filter(|_| context.rng.flip(self.probability))
            .collect();
        context.rng.shuffle(&mut participants);

        let mut mated = 0;
        for pair in participants.chunks_exact(2) {
            let (first, second) = pair_mut(&mut deme.population, pair[0], pair[1]);
            let success = if self.constrained {
                mate_constrained(first, second, context, self.max_depth, self.attempts)
            } else {
                mate(first, second, &mut context.rng)
            };
            if success {
                first.invalidate();
                second.invalidate();
                mated += 1;
            }
        }
        debug!(
            operator = self.name(),
            candidates = participants.len(),
            mated,
            "crossover done"
        );
        Ok(())
    }
}
