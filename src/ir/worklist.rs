//! Ordered node list without duplicates.

use std::collections::HashSet;

use crate::ir::NodeId;

/// An insertion-ordered list of nodes in which every node appears at most once.
///
/// Used for the macro node list (iterated by index from the tail while it shrinks),
/// the set of nodes recorded for the next value-numbering pass, and value-numbering
/// worklists. Removal keeps the relative order of the remaining nodes.
#[derive(Debug, Clone, Default)]
pub struct UniqueNodeList {
    order: Vec<NodeId>,
    members: HashSet<NodeId>,
}

impl UniqueNodeList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `node` unless it is already present.
    ///
    /// # Returns
    ///
    /// `true` if the node was added.
    pub fn push(&mut self, node: NodeId) -> bool {
        if self.members.insert(node) {
            self.order.push(node);
            true
        } else {
            false
        }
    }

    /// Removes and returns the last node.
    pub fn pop(&mut self) -> Option<NodeId> {
        let node = self.order.pop()?;
        self.members.remove(&node);
        Some(node)
    }

    /// Removes `node`, keeping the order of the others.
    ///
    /// # Returns
    ///
    /// `true` if the node was present.
    pub fn remove(&mut self, node: NodeId) -> bool {
        if !self.members.remove(&node) {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|&n| n == node) {
            self.order.remove(pos);
        }
        true
    }

    /// Returns `true` if `node` is present.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    /// Returns the node at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<NodeId> {
        self.order.get(index).copied()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates the nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    /// Removes all nodes.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Keeps only the nodes for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        let members = &mut self.members;
        self.order.retain(|&n| {
            let kept = keep(n);
            if !kept {
                members.remove(&n);
            }
            kept
        });
    }

    /// Renames every node through `remap`, dropping nodes that map to `None`.
    pub fn remap(&mut self, remap: &[Option<NodeId>]) {
        let old = std::mem::take(&mut self.order);
        self.members.clear();
        for node in old {
            if let Some(new) = remap.get(node.index()).copied().flatten() {
                self.push(new);
            }
        }
    }
}
