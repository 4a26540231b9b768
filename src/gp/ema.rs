//! # Evolutionary module acquisition
//!
//! Compression freezes a random subtree into a module of the population-wide
//! module vector. Some descendant subtrees of the frozen subtree are kept
//! out of the module and become its arguments: the module body refers to
//! them through argument references, and the individual keeps them as the
//! children of a module invoker that replaces the frozen subtree.
//!
//! Expansion is the inverse: the module body is inlined at an invoker, with
//! every argument reference replaced by the invoker's corresponding child.
//!
//! Neither operation changes what an individual computes, so fitness is
//! kept.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::breeding::Operator;
use crate::error::{BeagleError, Result};
use crate::evolution::Deme;
use crate::gp::context::Context;
use crate::gp::individual::Individual;
use crate::gp::primitive::PrimitiveKind;
use crate::gp::primitives::{Argument, ModuleInvoker};
use crate::gp::tree::{Node, Tree};
use crate::register::{ParameterValue, Register};

pub const COMPRESS_PROBABILITY: &str = "gp.ema.compress.indpb";
pub const EXPAND_PROBABILITY: &str = "gp.ema.expand.indpb";
pub const MAX_ARGS: &str = "gp.ema.maxargs";

/// Whether the subtree at `index` may be frozen: a branch free of argument
/// references and invokers.
fn is_compressible(tree: &Tree, index: usize) -> bool {
    tree.nodes()[index].primitive.arity() > 0
        && tree.subtree(index).iter().all(|node| {
            let kind = node.primitive.kind();
            !kind.is_invoker() && !matches!(kind, PrimitiveKind::Argument(_))
        })
}

/// Compresses a random subtree of `individual` into a new module.
///
/// Returns `false` when no tree holds a compressible subtree.
pub fn compress(
    individual: &mut Individual,
    context: &mut Context,
    max_args: usize,
) -> Result<bool> {
    let candidates: Vec<(usize, usize)> = individual
        .trees
        .iter()
        .enumerate()
        .filter(|(_, tree)| tree.len() >= 2)
        .flat_map(|(tree_index, tree)| {
            (0..tree.len())
                .filter(move |&index| is_compressible(tree, index))
                .map(move |index| (tree_index, index))
        })
        .collect();
    if candidates.is_empty() {
        return Ok(false);
    }
    let (tree_index, root) = candidates[context.rng.roll_index(candidates.len())];
    let tree = &individual.trees[tree_index];
    let end = root + tree.nodes()[root].subtree_size;

    // Pick non-overlapping argument subtrees among the descendants.
    let wanted = context.rng.roll_integer(0, max_args);
    let mut pool: Vec<usize> = (root + 1..end).collect();
    let mut picks = Vec::with_capacity(wanted);
    while picks.len() < wanted && !pool.is_empty() {
        let pick = pool[context.rng.roll_index(pool.len())];
        let pick_end = pick + tree.nodes()[pick].subtree_size;
        pool.retain(|&other| {
            let is_descendant = other >= pick && other < pick_end;
            let is_ancestor = other < pick && pick < other + tree.nodes()[other].subtree_size;
            !is_descendant && !is_ancestor
        });
        picks.push(pick);
    }
    picks.sort_unstable();

    let arg_types: Vec<_> = picks
        .iter()
        .map(|&pick| tree.nodes()[pick].primitive.return_type())
        .collect();

    let mut body = Vec::with_capacity(end - root);
    let mut index = root;
    while index < end {
        match picks.iter().position(|&pick| pick == index) {
            Some(argument) => {
                body.push(Node::new(Arc::new(Argument::typed(
                    argument,
                    arg_types[argument],
                ))));
                index += tree.nodes()[index].subtree_size;
            }
            None => {
                body.push(tree.nodes()[index].clone());
                index += 1;
            }
        }
    }
    let module = Tree::from_nodes(body, tree.primitive_set_index(), picks.len())?;

    let mut replacement = Vec::with_capacity(1 + picks.len());
    let return_type = tree.nodes()[root].primitive.return_type();
    let slot = context.modules_mut().insert(module);
    replacement.push(Node::new(Arc::new(ModuleInvoker::new(
        slot,
        return_type,
        arg_types,
    ))));
    for &pick in &picks {
        replacement.extend_from_slice(tree.subtree(pick));
    }

    individual.trees[tree_index].replace_subtree(root, replacement);
    debug!(
        tree = tree_index,
        node = root,
        module = slot,
        arguments = picks.len(),
        "subtree compressed into module"
    );
    Ok(true)
}

/// Inlines the module called by the module invoker at `index` of tree
/// `tree_index`.
pub fn expand_at(
    individual: &mut Individual,
    context: &Context,
    tree_index: usize,
    index: usize,
) -> Result<bool> {
    let tree = individual
        .trees
        .get(tree_index)
        .ok_or_else(|| BeagleError::Other(format!("no tree {} to expand", tree_index)))?;
    let node = tree.node(index).ok_or(BeagleError::InvalidNode {
        index,
        size: tree.len(),
    })?;
    let PrimitiveKind::Module(slot) = node.primitive.kind() else {
        return Ok(false);
    };
    let Some(module) = context.modules().get(slot) else {
        warn!(module = slot, "invoker refers to an empty module slot");
        return Ok(false);
    };

    let arguments: Vec<&[Node]> = tree
        .children(index)
        .into_iter()
        .map(|child| tree.subtree(child))
        .collect();
    let mut inlined = Vec::with_capacity(module.len());
    for node in module.nodes() {
        match node.primitive.kind() {
            PrimitiveKind::Argument(argument) => {
                let subtree = arguments.get(argument).ok_or_else(|| {
                    BeagleError::Execution(format!(
                        "module {} refers to ARG{} but is called with {} arguments",
                        slot,
                        argument,
                        arguments.len()
                    ))
                })?;
                inlined.extend_from_slice(subtree);
            }
            _ => inlined.push(node.clone()),
        }
    }

    individual.trees[tree_index].replace_subtree(index, inlined);
    Ok(true)
}

/// Inlines a random module call of `individual`. Returns `false` when the
/// individual calls no module.
pub fn expand(individual: &mut Individual, context: &mut Context) -> Result<bool> {
    let invokers: Vec<(usize, usize)> = individual
        .trees
        .iter()
        .enumerate()
        .flat_map(|(tree_index, tree)| {
            tree.nodes()
                .iter()
                .enumerate()
                .filter(|(_, node)| matches!(node.primitive.kind(), PrimitiveKind::Module(_)))
                .map(move |(index, _)| (tree_index, index))
        })
        .collect();
    if invokers.is_empty() {
        return Ok(false);
    }
    let (tree_index, index) = invokers[context.rng.roll_index(invokers.len())];
    expand_at(individual, context, tree_index, index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmaKind {
    Compress,
    Expand,
}

/// `GP-EMACompressOp` and `GP-EMAExpandOp`.
#[derive(Debug, Clone)]
pub struct EmaOp {
    kind: EmaKind,
    probability: f64,
    max_args: usize,
}

impl EmaOp {
    pub fn compress() -> Self {
        Self {
            kind: EmaKind::Compress,
            probability: 0.05,
            max_args: 3,
        }
    }

    pub fn expand() -> Self {
        Self {
            kind: EmaKind::Expand,
            ..Self::compress()
        }
    }
}

impl Operator for EmaOp {
    fn name(&self) -> &str {
        match self.kind {
            EmaKind::Compress => "GP-EMACompressOp",
            EmaKind::Expand => "GP-EMAExpandOp",
        }
    }

    fn initialize(&mut self, register: &mut Register) -> Result<()> {
        match self.kind {
            EmaKind::Compress => {
                register.declare(
                    COMPRESS_PROBABILITY,
                    ParameterValue::Float(0.05),
                    "probability that an individual has a subtree compressed into a module",
                );
                register.declare(
                    MAX_ARGS,
                    ParameterValue::Int(3),
                    "maximum number of arguments of a new module",
                );
                self.probability = register.probability(COMPRESS_PROBABILITY)?;
                self.max_args = register.uint(MAX_ARGS)?;
            }
            EmaKind::Expand => {
                register.declare(
                    EXPAND_PROBABILITY,
                    ParameterValue::Float(0.05),
                    "probability that an individual has a module call inlined",
                );
                self.probability = register.probability(EXPAND_PROBABILITY)?;
            }
        }
        Ok(())
    }

    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()> {
        let mut changed = 0;
        for individual in deme.population.iter_mut() {
            if !context.rng.flip(self.probability) {
                continue;
            }
            let done = match self.kind {
                EmaKind::Compress => compress(individual, context, self.max_args)?,
                EmaKind::Expand => expand(individual, context)?,
            };
            if done {
                changed += 1;
            }
        }
        debug!(
            operator = self.name(),
            changed,
            modules = context.modules().occupied(),
            "module acquisition done"
        );
        Ok(())
    }
}
