//! # Tree
//!
//! A GP tree is stored as a flat vector of nodes in pre-order. Every node
//! records the size of the subtree it roots, itself included, so the
//! children of a node are found by skipping over subtree sizes and a subtree
//! is a contiguous slice of the vector.
//!
//! A tree also knows the primitive set its nodes come from and how many
//! arguments it takes when it is called as an ADF or a module.

use std::fmt;
use std::sync::Arc;

use crate::error::{BeagleError, Result};
use crate::gp::context::Context;
use crate::gp::primitive::Primitive;
use crate::gp::value::ValueType;

#[derive(Clone)]
pub struct Node {
    pub primitive: Arc<dyn Primitive>,
    pub subtree_size: usize,
}

impl Node {
    pub fn new(primitive: Arc<dyn Primitive>) -> Self {
        Self {
            primitive,
            subtree_size: 1,
        }
    }

    pub fn with_size(primitive: Arc<dyn Primitive>, subtree_size: usize) -> Self {
        Self {
            primitive,
            subtree_size,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.primitive.name(), self.subtree_size)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    primitive_set_index: usize,
    number_arguments: usize,
}

impl Tree {
    pub fn new(primitive_set_index: usize, number_arguments: usize) -> Self {
        Self {
            nodes: Vec::new(),
            primitive_set_index,
            number_arguments,
        }
    }

    /// Builds a tree from pre-order nodes, recomputing every subtree size.
    ///
    /// Fails when the arities do not describe exactly one complete tree.
    pub fn from_nodes(
        nodes: Vec<Node>,
        primitive_set_index: usize,
        number_arguments: usize,
    ) -> Result<Self> {
        let mut tree = Self {
            nodes,
            primitive_set_index,
            number_arguments,
        };
        if tree.nodes.is_empty() {
            return Ok(tree);
        }
        match tree.checked_size(0) {
            Some(size) if size == tree.nodes.len() => {
                tree.fix_subtree_size(0);
                Ok(tree)
            }
            _ => Err(BeagleError::Format(format!(
                "{} nodes do not form a single well-formed tree",
                tree.nodes.len()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn primitive_set_index(&self) -> usize {
        self.primitive_set_index
    }

    pub fn number_arguments(&self) -> usize {
        self.number_arguments
    }

    pub fn set_number_arguments(&mut self, number_arguments: usize) {
        self.number_arguments = number_arguments;
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Appends a node in pre-order. Sizes must be fixed by the caller.
    pub(crate) fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub(crate) fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    fn checked_size(&self, index: usize) -> Option<usize> {
        let node = self.nodes.get(index)?;
        let mut size = 1;
        for _ in 0..node.primitive.arity() {
            size += self.checked_size(index + size)?;
        }
        Some(size)
    }

    /// Recomputes the subtree sizes below and including `index` from the
    /// arities, and returns the size of the subtree at `index`.
    pub fn fix_subtree_size(&mut self, index: usize) -> usize {
        let mut size = 1;
        for _ in 0..self.nodes[index].primitive.arity() {
            size += self.fix_subtree_size(index + size);
        }
        self.nodes[index].subtree_size = size;
        size
    }

    /// Indices of the children of the node at `index`.
    pub fn children(&self, index: usize) -> Vec<usize> {
        let arity = self.nodes[index].primitive.arity();
        let mut children = Vec::with_capacity(arity);
        let mut child = index + 1;
        for _ in 0..arity {
            children.push(child);
            child += self.nodes[child].subtree_size;
        }
        children
    }

    /// Parent of the node at `index` and the position of the node among the
    /// parent's children. `None` for the root.
    pub fn parent(&self, index: usize) -> Option<(usize, usize)> {
        let mut current = 0;
        let mut found = None;
        while current != index {
            let mut child = current + 1;
            let mut position = 0;
            while child + self.nodes[child].subtree_size <= index {
                child += self.nodes[child].subtree_size;
                position += 1;
            }
            found = Some((current, position));
            current = child;
        }
        found
    }

    /// Number of edges plus one between the root and the node at `index`.
    pub fn node_depth(&self, index: usize) -> usize {
        let mut depth = 1;
        let mut current = 0;
        while current != index {
            let mut child = current + 1;
            while child + self.nodes[child].subtree_size <= index {
                child += self.nodes[child].subtree_size;
            }
            current = child;
            depth += 1;
        }
        depth
    }

    /// Depth of the subtree rooted at `index`; a leaf has depth 1.
    pub fn subtree_depth(&self, index: usize) -> usize {
        1 + self
            .children(index)
            .into_iter()
            .map(|child| self.subtree_depth(child))
            .max()
            .unwrap_or(0)
    }

    /// Depth of the whole tree, 0 when empty.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            0
        } else {
            self.subtree_depth(0)
        }
    }

    pub fn subtree(&self, index: usize) -> &[Node] {
        &self.nodes[index..index + self.nodes[index].subtree_size]
    }

    /// Replaces the subtree at `index` by `replacement` and returns the
    /// removed nodes. Sizes of every node are fixed afterwards.
    pub fn replace_subtree(&mut self, index: usize, replacement: Vec<Node>) -> Vec<Node> {
        let end = index + self.nodes[index].subtree_size;
        let removed = self.nodes.splice(index..end, replacement).collect();
        if !self.nodes.is_empty() {
            self.fix_subtree_size(0);
        }
        removed
    }

    /// Type the node at `index` must return: the primitive set's root type at
    /// the root, the parent's argument type elsewhere.
    pub fn expected_type(&self, index: usize, context: &Context) -> Result<ValueType> {
        match self.parent(index) {
            Some((parent, position)) => Ok(self.nodes[parent].primitive.arg_type(position)),
            None => Ok(context.primitive_set(self.primitive_set_index)?.root_type()),
        }
    }

    /// Rebuilds the context's call stack as the path from the root down to
    /// `index`, both included.
    pub fn set_context_to_node(&self, index: usize, context: &mut Context) -> Result<()> {
        if index >= self.nodes.len() {
            return Err(BeagleError::InvalidNode {
                index,
                size: self.nodes.len(),
            });
        }
        context.clear_call_stack();
        let mut current = 0;
        context.push_call_stack(current);
        while current != index {
            let mut child = current + 1;
            while child + self.nodes[child].subtree_size <= index {
                child += self.nodes[child].subtree_size;
            }
            current = child;
            context.push_call_stack(current);
        }
        Ok(())
    }

    /// Validates the subtree at `index`, whose parent must be on top of the
    /// context's call stack (or the stack empty for the root).
    ///
    /// Each node is pushed on the call stack while its primitive validates
    /// itself, then the children are visited. Stops at the first failure.
    pub fn validate_sub_tree(&self, index: usize, context: &mut Context) -> bool {
        let Some(node) = self.nodes.get(index) else {
            return false;
        };
        let expected = match context.node_index() {
            Some(parent) => {
                let Some(position) = self.children(parent).iter().position(|&c| c == index)
                else {
                    return false;
                };
                self.nodes[parent].primitive.arg_type(position)
            }
            None => match context.primitive_set(self.primitive_set_index) {
                Ok(set) => set.root_type(),
                Err(_) => return false,
            },
        };
        if !node.primitive.return_type().is_compatible_with(expected) {
            return false;
        }

        context.push_call_stack(index);
        let valid = node.primitive.validate(self, context)
            && self
                .children(index)
                .into_iter()
                .all(|child| self.validate_sub_tree(child, context));
        context.pop_call_stack();
        valid
    }

    /// Validates every node of the tree.
    pub fn validate(&self, context: &mut Context) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        context.clear_call_stack();
        let valid = self.validate_sub_tree(0, context);
        context.clear_call_stack();
        valid
    }

    /// Validates the subtree at `index` in place, with its ancestors on the
    /// call stack.
    pub fn validate_at(&self, index: usize, context: &mut Context) -> bool {
        let valid = match self.parent(index) {
            None => return self.validate(context),
            Some((parent, _)) => {
                self.set_context_to_node(parent, context).is_ok()
                    && self.validate_sub_tree(index, context)
            }
        };
        context.clear_call_stack();
        valid
    }

    fn fmt_node(&self, index: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let primitive = &self.nodes[index].primitive;
        let label = match primitive.parameter() {
            Some(parameter) => format!("{}[{}]", primitive.name(), parameter),
            None => primitive.name().to_string(),
        };
        let children = self.children(index);
        if children.is_empty() {
            return write!(f, "{}", label);
        }
        write!(f, "({}", label)?;
        for child in children {
            write!(f, " ")?;
            self.fmt_node(child, f)?;
        }
        write!(f, ")")
    }
}

/// S-expression rendering, e.g. `(+ X (* X X))`.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return write!(f, "()");
        }
        self.fmt_node(0, f)
    }
}
