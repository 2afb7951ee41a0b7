//! Arena storage of the sea-of-nodes graph.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Graph                                                        │
//! │   nodes: Vec<Node>        arena indexed by NodeId            │
//! │     ├─ inputs             positional def edges (Option)      │
//! │     └─ outs               reverse use edges, one per input   │
//! │   root                    inputs = method terminators        │
//! │   top                     the dead value                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every edge mutation keeps `inputs` and `outs` symmetric: if node `u` has `d` at `k`
//! input positions, `d.outs` lists `u` exactly `k` times. Removed nodes become
//! tombstones (flagged [`NodeFlags::DEAD`]) so ids held elsewhere stay meaningful;
//! [`Graph::compact`] reclaims them and returns the id remapping.

use crate::{
    ir::{JvmState, Node, NodeFlags, NodeId, Op, ProjKind, Type},
    Error, Result,
};

/// A sea-of-nodes graph.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    root: NodeId,
    top: NodeId,
    live: usize,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates a graph holding only the root and top nodes.
    #[must_use]
    pub fn new() -> Self {
        let nodes = vec![
            Node::new(Op::Root, Type::Control, Vec::new()),
            Node::new(Op::Top, Type::Top, Vec::new()),
        ];
        Self {
            nodes,
            root: NodeId(0),
            top: NodeId(1),
            live: 2,
        }
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the top (dead value) node.
    #[must_use]
    pub fn top(&self) -> NodeId {
        self.top
    }

    /// Returns the number of arena slots, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the arena holds no slots; never the case for a constructed graph.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Returns the live node `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if `id` is out of range or removed.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        match self.nodes.get(id.0) {
            Some(node) if node.is_live() => Ok(node),
            _ => Err(Error::InvalidNode(id)),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.nodes.get_mut(id.0) {
            Some(node) if node.is_live() => Ok(node),
            _ => Err(Error::InvalidNode(id)),
        }
    }

    /// Returns the live node `id`, or `None`.
    #[must_use]
    pub fn try_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).filter(|n| n.is_live())
    }

    /// Returns `true` if `id` refers to a live node.
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        self.try_node(id).is_some()
    }

    /// Returns the operation of a live node.
    #[must_use]
    pub fn op(&self, id: NodeId) -> Option<&Op> {
        self.try_node(id).map(Node::op)
    }

    /// Returns the type of a live node; removed nodes are `Top`.
    #[must_use]
    pub fn ty(&self, id: NodeId) -> Type {
        self.try_node(id).map_or(Type::Top, Node::ty)
    }

    /// Returns input `index` of `id`.
    #[must_use]
    pub fn input(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.try_node(id).and_then(|n| n.input(index))
    }

    /// Returns the use edges of `id`.
    #[must_use]
    pub fn outs(&self, id: NodeId) -> &[NodeId] {
        self.try_node(id).map_or(&[], Node::outs)
    }

    /// Returns the number of use edges of `id`.
    #[must_use]
    pub fn outcnt(&self, id: NodeId) -> usize {
        self.outs(id).len()
    }

    /// Returns the distinct users of `id`, in first-use order.
    #[must_use]
    pub fn unique_outs(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = Vec::new();
        for &user in self.outs(id) {
            if !seen.contains(&user) {
                seen.push(user);
            }
        }
        seen
    }

    /// Iterates the ids of all live nodes in arena order.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_live())
            .map(|(i, _)| NodeId(i))
    }

    /// Counts the live nodes whose operation satisfies `pred`.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.is_live() && pred(n.op()))
            .count()
    }

    fn add_out(&mut self, def: NodeId, user: NodeId) -> Result<()> {
        self.node_mut(def)?.outs.push(user);
        Ok(())
    }

    fn del_out(&mut self, def: NodeId, user: NodeId) {
        if let Some(node) = self.nodes.get_mut(def.0) {
            if let Some(pos) = node.outs.iter().position(|&u| u == user) {
                node.outs.swap_remove(pos);
            }
        }
    }

    /// Adds a node with the given inputs and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if an input is not a live node.
    pub fn add_node(&mut self, op: Op, ty: Type, inputs: Vec<Option<NodeId>>) -> Result<NodeId> {
        for input in inputs.iter().flatten() {
            self.node(*input)?;
        }
        let id = NodeId(self.nodes.len());
        let edges: Vec<NodeId> = inputs.iter().flatten().copied().collect();
        self.nodes.push(Node::new(op, ty, inputs));
        self.live += 1;
        for def in edges {
            self.add_out(def, id)?;
        }
        Ok(id)
    }

    /// Sets input `index` of `id` to `new`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] for removed nodes, or an invariant error if
    /// `index` is past the node's inputs.
    pub fn set_input(&mut self, id: NodeId, index: usize, new: Option<NodeId>) -> Result<()> {
        if let Some(new) = new {
            self.node(new)?;
        }
        let node = self.node_mut(id)?;
        let len = node.inputs.len();
        let Some(slot) = node.inputs.get_mut(index) else {
            return Err(invariant_error!(
                "input {} out of range for {} with {} inputs",
                index,
                id,
                len
            ));
        };
        let old = std::mem::replace(slot, new);
        if old == new {
            return Ok(());
        }
        if let Some(old) = old {
            self.del_out(old, id);
        }
        if let Some(new) = new {
            self.add_out(new, id)?;
        }
        Ok(())
    }

    /// Appends an input to `id`.
    ///
    /// # Returns
    ///
    /// The position of the new input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if either node is not live.
    pub fn add_input(&mut self, id: NodeId, new: Option<NodeId>) -> Result<usize> {
        if let Some(new) = new {
            self.node(new)?;
        }
        let node = self.node_mut(id)?;
        node.inputs.push(new);
        let index = node.inputs.len() - 1;
        if let Some(new) = new {
            self.add_out(new, id)?;
        }
        Ok(index)
    }

    /// Removes input `index` of `id`, shifting later inputs down.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not live or `index` is out of range.
    pub fn del_input(&mut self, id: NodeId, index: usize) -> Result<()> {
        let node = self.node_mut(id)?;
        if index >= node.inputs.len() {
            return Err(invariant_error!(
                "cannot delete input {} of {} with {} inputs",
                index,
                id,
                node.inputs.len()
            ));
        }
        if let Some(old) = node.inputs.remove(index) {
            self.del_out(old, id);
        }
        Ok(())
    }

    /// Replaces every input of `id` equal to `old` with `new`.
    ///
    /// # Returns
    ///
    /// The number of replaced edges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if a node is not live.
    pub fn replace_edge(&mut self, id: NodeId, old: NodeId, new: NodeId) -> Result<usize> {
        let len = self.node(id)?.req();
        self.replace_edges_in_range(id, old, new, 0, len)
    }

    /// Replaces inputs of `id` equal to `old` with `new` within positions
    /// `[start, end)`.
    ///
    /// # Returns
    ///
    /// The number of replaced edges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if a node is not live.
    pub fn replace_edges_in_range(
        &mut self,
        id: NodeId,
        old: NodeId,
        new: NodeId,
        start: usize,
        end: usize,
    ) -> Result<usize> {
        self.node(new)?;
        let node = self.node(id)?;
        let end = end.min(node.req());
        let positions: Vec<usize> = (start..end)
            .filter(|&i| node.inputs[i] == Some(old))
            .collect();
        for &i in &positions {
            self.set_input(id, i, Some(new))?;
        }
        Ok(positions.len())
    }

    /// Redirects every use of `old` to `new`.
    ///
    /// # Returns
    ///
    /// The distinct users that were rewired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if either node is not live.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) -> Result<Vec<NodeId>> {
        self.node(new)?;
        let users = self.unique_outs(old);
        if old == new {
            return Ok(Vec::new());
        }
        for &user in &users {
            self.replace_edge(user, old, new)?;
        }
        Ok(users)
    }

    /// Clears every input of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if `id` is not live.
    pub fn disconnect_inputs(&mut self, id: NodeId) -> Result<()> {
        let inputs = std::mem::take(&mut self.node_mut(id)?.inputs);
        for def in inputs.iter().flatten() {
            self.del_out(*def, id);
        }
        self.node_mut(id)?.inputs = vec![None; inputs.len()];
        Ok(())
    }

    /// Removes a node without uses, leaving a tombstone.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if the node still has uses or is the root or top.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        if id == self.root || id == self.top {
            return Err(invariant_error!("cannot remove {} ({})", id, self.node(id)?.op().name()));
        }
        let node = self.node(id)?;
        if let Some(user) = node.outs.iter().find(|&&u| u != id) {
            return Err(invariant_error!(
                "cannot remove {} ({}) still used by {}",
                id,
                node.op().name(),
                user
            ));
        }
        self.disconnect_inputs(id)?;
        let node = self.node_mut(id)?;
        node.outs.clear();
        node.jvms = None;
        node.flags.insert(NodeFlags::DEAD);
        self.live -= 1;
        Ok(())
    }

    /// Sets the type of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if `id` is not live.
    pub fn set_type(&mut self, id: NodeId, ty: Type) -> Result<()> {
        self.node_mut(id)?.ty = ty;
        Ok(())
    }

    /// Attaches debug state to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if `id` is not live.
    pub fn set_jvms(&mut self, id: NodeId, jvms: JvmState) -> Result<()> {
        self.node_mut(id)?.jvms = Some(jvms);
        Ok(())
    }

    /// Returns the debug state of `id` for modification.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not live or carries no debug state.
    pub fn jvms_mut(&mut self, id: NodeId) -> Result<&mut JvmState> {
        let node = self.node_mut(id)?;
        let name = node.op().name();
        node.jvms
            .as_mut()
            .ok_or_else(|| invariant_error!("{} ({}) has no debug state", id, name))
    }

    /// Returns the projection of `id` selecting `kind`, if one exists.
    #[must_use]
    pub fn find_proj(&self, id: NodeId, kind: ProjKind) -> Option<NodeId> {
        self.outs(id)
            .iter()
            .copied()
            .find(|&u| self.try_node(u).and_then(Node::proj_kind) == Some(kind))
    }

    /// Returns all projections of `id` with their kinds.
    #[must_use]
    pub fn projections(&self, id: NodeId) -> Vec<(ProjKind, NodeId)> {
        self.unique_outs(id)
            .into_iter()
            .filter_map(|u| {
                let node = self.try_node(u)?;
                match node.op() {
                    Op::Proj(kind) if node.input(0) == Some(id) => Some((*kind, u)),
                    _ => None,
                }
            })
            .collect()
    }

    /// Marks every node reachable from the root through inputs.
    ///
    /// The top node is always considered reachable.
    #[must_use]
    pub fn reachable_from_root(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = vec![self.root, self.top];
        while let Some(id) = stack.pop() {
            if reachable[id.0] || !self.is_live(id) {
                continue;
            }
            reachable[id.0] = true;
            stack.extend(self.nodes[id.0].inputs.iter().flatten().copied());
        }
        reachable
    }

    /// Removes every live node not marked in `reachable`.
    ///
    /// # Returns
    ///
    /// The removed nodes.
    pub fn remove_unreachable(&mut self, reachable: &[bool]) -> Vec<NodeId> {
        let doomed: Vec<NodeId> = self
            .live_nodes()
            .filter(|id| !reachable.get(id.0).copied().unwrap_or(false))
            .collect();
        for &id in &doomed {
            let inputs = std::mem::take(&mut self.nodes[id.0].inputs);
            for def in inputs.iter().flatten() {
                self.del_out(*def, id);
            }
        }
        for &id in &doomed {
            let node = &mut self.nodes[id.0];
            node.outs.clear();
            node.jvms = None;
            node.flags.insert(NodeFlags::DEAD);
        }
        self.live -= doomed.len();
        doomed
    }

    /// Drops all tombstones and renumbers the live nodes densely.
    ///
    /// # Returns
    ///
    /// The remapping table: entry `i` is the new id of old node `i`, or `None` for
    /// removed nodes.
    pub fn compact(&mut self) -> Vec<Option<NodeId>> {
        let mut remap = vec![None; self.nodes.len()];
        let mut next = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_live() {
                remap[i] = Some(NodeId(next));
                next += 1;
            }
        }
        let old = std::mem::take(&mut self.nodes);
        let rename = |id: NodeId| remap.get(id.0).copied().flatten();
        for mut node in old.into_iter().filter(Node::is_live) {
            node.inputs = node
                .inputs
                .iter()
                .map(|input| input.and_then(rename))
                .collect();
            node.outs = node.outs.iter().filter_map(|&u| rename(u)).collect();
            self.nodes.push(node);
        }
        self.root = rename(self.root).unwrap_or(NodeId(0));
        self.top = rename(self.top).unwrap_or(NodeId(1));
        self.live = self.nodes.len();
        remap
    }

    /// Renders every live node, one per line.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for id in self.live_nodes() {
            if let Some(node) = self.try_node(id) {
                out.push_str(&format!("{id}: {node}\n"));
            }
        }
        out
    }
}
