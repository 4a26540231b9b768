//! # Initialization
//!
//! Random tree generation with the grow, full and ramped half-and-half
//! methods, and the operators that fill a deme with freshly generated
//! individuals.
//!
//! Depth counts levels: a lone terminal has depth 1.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::breeding::Operator;
use crate::error::{BeagleError, Result};
use crate::evolution::Deme;
use crate::gp::context::Context;
use crate::gp::individual::Individual;
use crate::gp::primitive::SelectionScope;
use crate::gp::primitive_set::{NodeCategory, PrimitiveSet, PrimitiveSuperSet};
use crate::gp::tree::{Node, Tree};
use crate::gp::value::ValueType;
use crate::register::{ParameterValue, Register};
use crate::rng::RandomNumberGenerator;

pub const MIN_DEPTH: &str = "gp.init.mindepth";
pub const MAX_DEPTH: &str = "gp.init.maxdepth";
pub const MIN_TREES: &str = "gp.init.mintree";
pub const MAX_TREES: &str = "gp.init.maxtree";
pub const MIN_ARGS: &str = "gp.tree.minargs";
pub const MAX_ARGS: &str = "gp.tree.maxargs";
pub const MAX_TREE_DEPTH: &str = "gp.tree.maxdepth";
pub const ATTEMPTS: &str = "gp.init.try";
pub const POPULATION_SIZE: &str = "ec.pop.size";

/// Declares the tree shape parameters shared by initialization, mutation
/// and crossover.
pub fn declare_tree_parameters(register: &mut Register) {
    register.declare(
        MIN_ARGS,
        ParameterValue::Int(1),
        "minimum number of arguments of an ADF tree",
    );
    register.declare(
        MAX_ARGS,
        ParameterValue::Int(2),
        "maximum number of arguments of an ADF tree",
    );
    register.declare(
        MAX_TREE_DEPTH,
        ParameterValue::Int(17),
        "maximum depth of any tree",
    );
}

/// Tree generation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMethod {
    Grow,
    Full,
    /// Fair coin between grow and full for every tree.
    Half,
}

impl InitMethod {
    pub fn operator_name(self) -> &'static str {
        match self {
            InitMethod::Grow => "GP-InitGrowOp",
            InitMethod::Full => "GP-InitFullOp",
            InitMethod::Half => "GP-InitHalfOp",
        }
    }
}

/// Shape constraints of generated individuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitConfig {
    pub min_depth: usize,
    pub max_depth: usize,
    pub min_trees: usize,
    pub max_trees: usize,
    pub min_args: usize,
    pub max_args: usize,
    pub max_tree_depth: usize,
    pub attempts: usize,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            min_depth: 2,
            max_depth: 5,
            min_trees: 1,
            max_trees: 1,
            min_args: 1,
            max_args: 2,
            max_tree_depth: 17,
            attempts: 16,
        }
    }
}

impl InitConfig {
    pub fn with_depth(mut self, min_depth: usize, max_depth: usize) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }

    pub fn with_trees(mut self, min_trees: usize, max_trees: usize) -> Self {
        self.min_trees = min_trees;
        self.max_trees = max_trees;
        self
    }

    pub fn with_arguments(mut self, min_args: usize, max_args: usize) -> Self {
        self.min_args = min_args;
        self.max_args = max_args;
        self
    }

    pub fn from_register(register: &Register) -> Result<Self> {
        Ok(Self {
            min_depth: register.uint(MIN_DEPTH)?,
            max_depth: register.uint(MAX_DEPTH)?,
            min_trees: register.uint(MIN_TREES)?,
            max_trees: register.uint(MAX_TREES)?,
            min_args: register.uint(MIN_ARGS)?,
            max_args: register.uint(MAX_ARGS)?,
            max_tree_depth: register.uint(MAX_TREE_DEPTH)?,
            attempts: register.uint(ATTEMPTS)?,
        })
    }

    /// Rejects inconsistent bounds before anything is generated.
    pub fn check(&self, primitives: &PrimitiveSuperSet) -> Result<()> {
        let problem = if self.min_depth == 0 {
            Some("minimum init depth must be at least 1".to_string())
        } else if self.min_depth > self.max_depth {
            Some(format!(
                "minimum init depth {} exceeds maximum {}",
                self.min_depth, self.max_depth
            ))
        } else if self.max_depth > self.max_tree_depth {
            Some(format!(
                "maximum init depth {} exceeds the tree depth limit {}",
                self.max_depth, self.max_tree_depth
            ))
        } else if self.max_trees == 0 {
            Some("individuals need at least one tree".to_string())
        } else if self.min_trees > self.max_trees {
            Some(format!(
                "minimum tree count {} exceeds maximum {}",
                self.min_trees, self.max_trees
            ))
        } else if self.max_trees > primitives.len() {
            Some(format!(
                "{} trees requested but only {} primitive sets defined",
                self.max_trees,
                primitives.len()
            ))
        } else if self.min_args > self.max_args {
            Some(format!(
                "minimum argument count {} exceeds maximum {}",
                self.min_args, self.max_args
            ))
        } else if self.attempts == 0 {
            Some("at least one generation attempt is needed".to_string())
        } else {
            None
        };
        match problem {
            Some(message) => Err(BeagleError::Configuration(message)),
            None => Ok(()),
        }
    }
}

/// Draws nodes from one primitive set into a pre-order node vector.
#[derive(Debug, Clone, Copy)]
pub struct Generator<'g> {
    set: &'g PrimitiveSet,
    scope: SelectionScope<'g>,
}

impl<'g> Generator<'g> {
    pub fn new(set: &'g PrimitiveSet, scope: SelectionScope<'g>) -> Self {
        Self { set, scope }
    }

    fn draw(
        &self,
        category: NodeCategory,
        return_type: ValueType,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Node> {
        self.set
            .select(category, return_type, &self.scope, rng)
            .map(Node::new)
            .ok_or_else(|| {
                BeagleError::Configuration(format!(
                    "no {:?} primitive returning {:?} available for {} arguments",
                    category, return_type, self.scope.number_arguments
                ))
            })
    }

    /// Appends a grow subtree and returns its size. Leaves are forced once
    /// `max_depth` is reached, branches until `min_depth` is reached.
    pub fn grow(
        &self,
        nodes: &mut Vec<Node>,
        min_depth: usize,
        max_depth: usize,
        return_type: ValueType,
        rng: &mut RandomNumberGenerator,
    ) -> Result<usize> {
        let category = if max_depth <= 1 {
            NodeCategory::Leaf
        } else if min_depth > 1 {
            NodeCategory::Branch
        } else {
            NodeCategory::Any
        };
        let node = self.draw(category, return_type, rng)?;
        let primitive = Arc::clone(&node.primitive);
        let index = nodes.len();
        nodes.push(node);
        let mut size = 1;
        for position in 0..primitive.arity() {
            size += self.grow(
                nodes,
                min_depth.saturating_sub(1),
                max_depth - 1,
                primitive.arg_type(position),
                rng,
            )?;
        }
        nodes[index].subtree_size = size;
        Ok(size)
    }

    /// Appends a full subtree of exactly `depth` levels and returns its size.
    pub fn full(
        &self,
        nodes: &mut Vec<Node>,
        depth: usize,
        return_type: ValueType,
        rng: &mut RandomNumberGenerator,
    ) -> Result<usize> {
        let category = if depth <= 1 {
            NodeCategory::Leaf
        } else {
            NodeCategory::Branch
        };
        let node = self.draw(category, return_type, rng)?;
        let primitive = Arc::clone(&node.primitive);
        let index = nodes.len();
        nodes.push(node);
        let mut size = 1;
        for position in 0..primitive.arity() {
            size += self.full(nodes, depth - 1, primitive.arg_type(position), rng)?;
        }
        nodes[index].subtree_size = size;
        Ok(size)
    }

    /// Generates the nodes of a whole tree with `method`, drawing the depth
    /// uniformly in `[min_depth, max_depth]`.
    pub fn tree_nodes(
        &self,
        method: InitMethod,
        min_depth: usize,
        max_depth: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<Node>> {
        let depth = rng.roll_integer(min_depth, max_depth);
        let use_grow = match method {
            InitMethod::Grow => true,
            InitMethod::Full => false,
            InitMethod::Half => rng.coin(),
        };
        let mut nodes = Vec::new();
        if use_grow {
            self.grow(&mut nodes, min_depth, depth, self.set.root_type(), rng)?;
        } else {
            self.full(&mut nodes, depth, self.set.root_type(), rng)?;
        }
        Ok(nodes)
    }
}

/// Generates one valid individual.
///
/// Trees are generated from the last ADF down to the main tree. A tree that
/// fails validation is regenerated up to `config.attempts` times.
pub fn init_individual(
    method: InitMethod,
    config: &InitConfig,
    context: &mut Context,
) -> Result<Individual> {
    let primitives = context.shared_primitives();
    config.check(&primitives)?;

    let tree_count = context.rng.roll_integer(config.min_trees, config.max_trees);
    let arguments: Vec<usize> = (0..tree_count)
        .map(|index| {
            if index == 0 {
                0
            } else {
                context.rng.roll_integer(config.min_args, config.max_args)
            }
        })
        .collect();

    let mut trees = vec![Tree::default(); tree_count];
    let saved_tree_index = context.tree_index();
    context.set_tree_arguments(arguments.clone());
    for index in (0..tree_count).rev() {
        let set = primitives.get(index)?;
        let generator = Generator::new(set, SelectionScope::new(arguments[index], &arguments));
        let mut generated = None;
        for attempt in 0..config.attempts {
            let nodes = generator.tree_nodes(
                method,
                config.min_depth,
                config.max_depth,
                &mut context.rng,
            )?;
            let tree = Tree::from_nodes(nodes, index, arguments[index])?;
            context.set_tree_index(index);
            if tree.validate(context) {
                generated = Some(tree);
                break;
            }
            trace!(tree = index, attempt, "generated tree failed validation");
        }
        context.set_tree_index(saved_tree_index);
        trees[index] = generated.ok_or_else(|| {
            BeagleError::Configuration(format!(
                "no valid tree {} generated in {} attempts",
                index, config.attempts
            ))
        })?;
    }
    Ok(Individual::with_trees(trees))
}

/// Fills a deme with new individuals up to `ec.pop.size`.
#[derive(Debug, Clone)]
pub struct InitializationOp {
    method: InitMethod,
    population_size: usize,
    config: InitConfig,
}

impl InitializationOp {
    pub fn new(method: InitMethod) -> Self {
        Self {
            method,
            population_size: 100,
            config: InitConfig::default(),
        }
    }

    pub fn grow() -> Self {
        Self::new(InitMethod::Grow)
    }

    pub fn full() -> Self {
        Self::new(InitMethod::Full)
    }

    pub fn half() -> Self {
        Self::new(InitMethod::Half)
    }
}

impl Operator for InitializationOp {
    fn name(&self) -> &str {
        self.method.operator_name()
    }

    fn initialize(&mut self, register: &mut Register) -> Result<()> {
        declare_tree_parameters(register);
        register.declare(
            MIN_DEPTH,
            ParameterValue::Int(2),
            "minimum depth of initial trees",
        );
        register.declare(
            MAX_DEPTH,
            ParameterValue::Int(5),
            "maximum depth of initial trees",
        );
        register.declare(
            MIN_TREES,
            ParameterValue::Int(1),
            "minimum number of trees per individual",
        );
        register.declare(
            MAX_TREES,
            ParameterValue::Int(1),
            "maximum number of trees per individual",
        );
        register.declare(
            ATTEMPTS,
            ParameterValue::Int(16),
            "attempts at generating a valid tree",
        );
        register.declare(
            POPULATION_SIZE,
            ParameterValue::Int(100),
            "number of individuals per deme",
        );
        self.config = InitConfig::from_register(register)?;
        self.population_size = register.uint(POPULATION_SIZE)?;
        Ok(())
    }

    fn operate(&mut self, deme: &mut Deme, context: &mut Context) -> Result<()> {
        let missing = self.population_size.saturating_sub(deme.population.len());
        debug!(
            operator = self.name(),
            deme = context.deme_index(),
            missing,
            "initializing population"
        );
        deme.population.reserve(missing);
        for _ in 0..missing {
            let individual = init_individual(self.method, &self.config, context)?;
            deme.population.push(individual);
        }
        Ok(())
    }
}
