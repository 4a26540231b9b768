//! # Persistence
//!
//! Trees, individuals, module vectors and milestones are written as JSON
//! documents through serde. A tree is stored as a nested node document,
//! each node carrying the primitive name, its per-node payload when it has
//! one (ephemeral value, module index), the type tags of nodes typed at
//! creation (module invokers, typed argument references), and its children:
//!
//! ```json
//! {"primitive_set": 0, "arguments": 0, "size": 3,
//!  "root": {"name": "+", "children": [{"name": "X"}, {"name": "E", "value": {"Float": 1.0}}]}}
//! ```
//!
//! Reading resolves names against the tree's primitive set and checks every
//! node's child count against the primitive's arity, and the node count
//! against the redundant `size`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BeagleError, Result};
use crate::evolution::Deme;
use crate::fitness::Fitness;
use crate::gp::individual::Individual;
use crate::gp::module::ModuleVector;
use crate::gp::primitive_set::{PrimitiveSet, PrimitiveSuperSet};
use crate::gp::tree::{Node, Tree};
use crate::gp::value::{Value, ValueType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<ValueType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub primitive_set: usize,
    pub arguments: usize,
    pub size: usize,
    pub root: Option<NodeRecord>,
}

impl TreeRecord {
    pub fn from_tree(tree: &Tree) -> Self {
        Self {
            primitive_set: tree.primitive_set_index(),
            arguments: tree.number_arguments(),
            size: tree.len(),
            root: (!tree.is_empty()).then(|| Self::node_record(tree, 0)),
        }
    }

    fn node_record(tree: &Tree, index: usize) -> NodeRecord {
        let primitive = &tree.nodes()[index].primitive;
        NodeRecord {
            name: primitive.name().to_string(),
            value: primitive.parameter(),
            types: primitive.signature(),
            children: tree
                .children(index)
                .into_iter()
                .map(|child| Self::node_record(tree, child))
                .collect(),
        }
    }

    /// Rebuilds the tree, resolving primitives in its primitive set.
    pub fn to_tree(&self, primitives: &PrimitiveSuperSet) -> Result<Tree> {
        let set = primitives.get(self.primitive_set).map_err(|_| {
            BeagleError::Format(format!(
                "tree refers to primitive set {} but only {} are defined",
                self.primitive_set,
                primitives.len()
            ))
        })?;
        let mut nodes = Vec::with_capacity(self.size);
        if let Some(root) = &self.root {
            Self::read_node(root, set, &mut nodes)?;
        }
        if nodes.len() != self.size {
            return Err(BeagleError::Format(format!(
                "tree declares {} nodes but holds {}",
                self.size,
                nodes.len()
            )));
        }
        Tree::from_nodes(nodes, self.primitive_set, self.arguments)
    }

    fn read_node(record: &NodeRecord, set: &PrimitiveSet, nodes: &mut Vec<Node>) -> Result<()> {
        let position = nodes.len();
        let shared = set.resolve(&record.name).ok_or_else(|| {
            BeagleError::Format(format!(
                "node {} names unknown primitive `{}`",
                position, record.name
            ))
        })?;
        let primitive = shared
            .instantiate(record.value.as_ref(), record.children.len())?
            .unwrap_or(shared);
        let primitive = primitive.with_signature(&record.types)?.unwrap_or(primitive);
        if primitive.arity() != record.children.len() {
            return Err(BeagleError::Format(format!(
                "node {} `{}` has {} children but arity {}",
                position,
                record.name,
                record.children.len(),
                primitive.arity()
            )));
        }
        nodes.push(Node::new(primitive));
        for child in &record.children {
            Self::read_node(child, set, nodes)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    #[serde(default)]
    pub fitness: Fitness,
    pub trees: Vec<TreeRecord>,
}

impl IndividualRecord {
    pub fn from_individual(individual: &Individual) -> Self {
        Self {
            fitness: individual.fitness,
            trees: individual.trees.iter().map(TreeRecord::from_tree).collect(),
        }
    }

    pub fn to_individual(&self, primitives: &PrimitiveSuperSet) -> Result<Individual> {
        let trees = self
            .trees
            .iter()
            .map(|tree| tree.to_tree(primitives))
            .collect::<Result<Vec<_>>>()?;
        Ok(Individual {
            trees,
            fitness: self.fitness,
        })
    }
}

pub fn modules_record(modules: &ModuleVector) -> Vec<Option<TreeRecord>> {
    modules
        .slots()
        .iter()
        .map(|slot| slot.as_ref().map(TreeRecord::from_tree))
        .collect()
}

pub fn modules_from_record(
    record: &[Option<TreeRecord>],
    primitives: &PrimitiveSuperSet,
) -> Result<ModuleVector> {
    let slots = record
        .iter()
        .map(|slot| slot.as_ref().map(|tree| tree.to_tree(primitives)).transpose())
        .collect::<Result<Vec<_>>>()?;
    Ok(ModuleVector::from_slots(slots))
}

pub fn write_tree(tree: &Tree) -> Result<String> {
    Ok(serde_json::to_string(&TreeRecord::from_tree(tree))?)
}

pub fn read_tree(text: &str, primitives: &PrimitiveSuperSet) -> Result<Tree> {
    let record: TreeRecord = serde_json::from_str(text)?;
    record.to_tree(primitives)
}

pub fn write_individual(individual: &Individual) -> Result<String> {
    Ok(serde_json::to_string(&IndividualRecord::from_individual(
        individual,
    ))?)
}

pub fn read_individual(text: &str, primitives: &PrimitiveSuperSet) -> Result<Individual> {
    let record: IndividualRecord = serde_json::from_str(text)?;
    record.to_individual(primitives)
}

pub fn write_modules(modules: &ModuleVector) -> Result<String> {
    Ok(serde_json::to_string(&modules_record(modules))?)
}

pub fn read_modules(text: &str, primitives: &PrimitiveSuperSet) -> Result<ModuleVector> {
    let record: Vec<Option<TreeRecord>> = serde_json::from_str(text)?;
    modules_from_record(&record, primitives)
}

/// Snapshot of an evolution, enough to restart it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub generation: usize,
    pub demes: Vec<Vec<IndividualRecord>>,
    #[serde(default)]
    pub hall_of_fame: Vec<IndividualRecord>,
    #[serde(default)]
    pub modules: Vec<Option<TreeRecord>>,
}

impl Milestone {
    pub fn capture(
        generation: usize,
        demes: &[Deme],
        hall_of_fame: &[Individual],
        modules: &ModuleVector,
    ) -> Self {
        Self {
            generation,
            demes: demes
                .iter()
                .map(|deme| {
                    deme.population
                        .iter()
                        .map(IndividualRecord::from_individual)
                        .collect()
                })
                .collect(),
            hall_of_fame: hall_of_fame
                .iter()
                .map(IndividualRecord::from_individual)
                .collect(),
            modules: modules_record(modules),
        }
    }

    pub fn restore_demes(&self, primitives: &PrimitiveSuperSet) -> Result<Vec<Deme>> {
        self.demes
            .iter()
            .map(|records| {
                let population = records
                    .iter()
                    .map(|record| record.to_individual(primitives))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Deme::with_population(population))
            })
            .collect()
    }

    pub fn restore_hall_of_fame(&self, primitives: &PrimitiveSuperSet) -> Result<Vec<Individual>> {
        self.hall_of_fame
            .iter()
            .map(|record| record.to_individual(primitives))
            .collect()
    }

    pub fn restore_modules(&self, primitives: &PrimitiveSuperSet) -> Result<ModuleVector> {
        modules_from_record(&self.modules, primitives)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), generation = self.generation, "milestone written");
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
