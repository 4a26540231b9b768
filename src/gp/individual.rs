//! An individual is a list of trees plus its fitness. Tree 0 is the result
//! producing branch; trees with a higher index are ADFs callable from trees
//! with a lower index.

use std::fmt;

use crate::fitness::Fitness;
use crate::gp::context::Context;
use crate::gp::interpreter::Interpreter;
use crate::gp::tree::Tree;

#[derive(Debug, Clone, Default)]
pub struct Individual {
    pub trees: Vec<Tree>,
    pub fitness: Fitness,
}

impl Individual {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trees(trees: Vec<Tree>) -> Self {
        Self {
            trees,
            fitness: Fitness::invalid(),
        }
    }

    /// Total number of nodes over all trees.
    pub fn size(&self) -> usize {
        self.trees.iter().map(Tree::len).sum()
    }

    /// Depth of the deepest tree.
    pub fn depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    /// Number of arguments of each tree, by tree index.
    pub fn tree_arguments(&self) -> Vec<usize> {
        self.trees.iter().map(Tree::number_arguments).collect()
    }

    pub fn invalidate(&mut self) {
        self.fitness.invalidate();
    }

    /// Validates every tree, setting the context's tree index as it goes.
    pub fn validate(&self, context: &mut Context) -> bool {
        let saved = context.tree_index();
        context.set_tree_arguments(self.tree_arguments());
        let valid = self.trees.iter().enumerate().all(|(index, tree)| {
            context.set_tree_index(index);
            tree.validate(context)
        });
        context.set_tree_index(saved);
        valid
    }

    /// An interpreter running this individual against `context`.
    pub fn interpreter<'a>(&'a self, context: &'a Context) -> Interpreter<'a> {
        Interpreter::new(context, self)
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, tree) in self.trees.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "tree {} ({} args): {}", index, tree.number_arguments(), tree)?;
        }
        Ok(())
    }
}
