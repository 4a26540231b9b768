//! # Module vector
//!
//! Evolved modules are trees extracted from individuals by module
//! compression and shared by the whole population. A slot keeps its index
//! for as long as something refers to it; freed slots are nulled rather than
//! removed so that invokers elsewhere keep pointing at the right module, and
//! are reused by the next compression.

use std::collections::BTreeSet;

use crate::gp::individual::Individual;
use crate::gp::primitive::PrimitiveKind;
use crate::gp::tree::Tree;

#[derive(Debug, Clone, Default)]
pub struct ModuleVector {
    slots: Vec<Option<Tree>>,
}

impl ModuleVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: Vec<Option<Tree>>) -> Self {
        Self { slots }
    }

    /// Number of slots, empty ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots holding a module.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn slots(&self) -> &[Option<Tree>] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&Tree> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Stores `module` in the first empty slot, or appends it.
    pub fn insert(&mut self, module: Tree) -> usize {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(module);
                index
            }
            None => {
                self.slots.push(Some(module));
                self.slots.len() - 1
            }
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Tree> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Module indices referenced by invokers in `individuals`.
    pub fn referenced<'a, I>(individuals: I) -> BTreeSet<usize>
    where
        I: IntoIterator<Item = &'a Individual>,
    {
        individuals
            .into_iter()
            .flat_map(|individual| individual.trees.iter())
            .flat_map(|tree| tree.nodes().iter())
            .filter_map(|node| match node.primitive.kind() {
                PrimitiveKind::Module(index) => Some(index),
                _ => None,
            })
            .collect()
    }

    /// Nulls every slot no individual of `live` refers to and returns the
    /// number of freed slots. `live` must cover every individual that may
    /// still be executed, hall-of-fame members included.
    pub fn cleanup<'a, I>(&mut self, live: I) -> usize
    where
        I: IntoIterator<Item = &'a Individual>,
    {
        let referenced = Self::referenced(live);
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !referenced.contains(&index) {
                *slot = None;
                freed += 1;
            }
        }
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        freed
    }
}
