//! Value numbering.
//!
//! Two entry points share the same identity rules and value table:
//!
//! - [`transform`] runs on a single freshly created node and answers the node to use
//!   in its place.
//! - [`PhaseIterGvn`] revisits nodes from a worklist until nothing changes, removing
//!   dead nodes, folding identities and commoning structurally equal pure nodes.
//!
//! The value table maps `(operation, type, inputs)` of pure nodes to their
//! representative. Entries go stale when a node's inputs change; they are validated
//! on lookup rather than eagerly rehashed.

use crate::{
    compiler::{Compile, EventKind},
    ir::{Node, NodeId, Op, Type, VectorOpcode, BOX, OBJ, VALUE},
    Result,
};

/// Structural identity of a pure node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ValueKey {
    op: Op,
    ty: Type,
    inputs: Vec<Option<NodeId>>,
}

impl ValueKey {
    fn of(node: &Node) -> Option<Self> {
        node.op().is_pure().then(|| ValueKey {
            op: node.op().clone(),
            ty: node.ty(),
            inputs: node.inputs().to_vec(),
        })
    }
}

/// Returns an existing node equivalent to `id`, if an identity rule applies.
fn identity(c: &Compile, id: NodeId) -> Option<NodeId> {
    let graph = c.graph();
    let node = graph.try_node(id)?;
    match node.op() {
        Op::VectorUnbox {
            shuffle_to_vector: false,
        } => {
            let obj = node.input(OBJ)?;
            let vbox = graph.try_node(obj)?;
            match vbox.op() {
                Op::VectorBox { vt } if node.vect_type() == Some(*vt) => {
                    let value = vbox.input(VALUE)?;
                    (vbox.input(BOX).is_some() && graph.ty(value) == node.ty()).then_some(value)
                }
                _ => None,
            }
        }
        Op::Vector(op) if op.opcode == VectorOpcode::VectorReinterpret => {
            let input = node.input(1)?;
            (graph.ty(input) == node.ty()).then_some(input)
        }
        Op::CastPP => {
            let input = node.input(1)?;
            (graph.ty(input) == node.ty()).then_some(input)
        }
        Op::Phi => {
            let mut unique = None;
            for value in &node.inputs()[1..] {
                match *value {
                    Some(v) if v == id => {}
                    Some(v) if unique.is_none() || unique == Some(v) => unique = Some(v),
                    _ => return None,
                }
            }
            unique
        }
        Op::MergeMem { slices } => {
            let base = node.input(1)?;
            let all_base = node.inputs()[2..].iter().all(|&m| m == Some(base));
            (slices.is_empty() || all_base).then_some(base)
        }
        _ => None,
    }
}

/// Returns the live representative of `key` other than `id`, if the table holds one.
fn lookup(c: &Compile, key: &ValueKey, id: NodeId) -> Option<NodeId> {
    let existing = *c.value_table.get(key)?;
    if existing == id {
        return None;
    }
    let node = c.graph().try_node(existing)?;
    (ValueKey::of(node).as_ref() == Some(key)).then_some(existing)
}

/// Applies identities and value numbering to the freshly created node `id`.
///
/// If another node replaces `id` and `id` has no uses yet, `id` is removed.
///
/// # Errors
///
/// Returns an error if `id` is not a live node.
pub(crate) fn transform(c: &mut Compile, id: NodeId) -> Result<NodeId> {
    c.graph().node(id)?;
    let replacement = match identity(c, id) {
        Some(same) => Some(same),
        None => {
            let key = c.graph().try_node(id).and_then(ValueKey::of);
            match key {
                Some(key) => match lookup(c, &key, id) {
                    Some(existing) => Some(existing),
                    None => {
                        c.value_table.insert(key, id);
                        None
                    }
                },
                None => None,
            }
        }
    };
    match replacement {
        Some(other) if other != id => {
            if c.graph().outcnt(id) == 0 {
                c.remove_node(id)?;
            }
            Ok(other)
        }
        _ => Ok(id),
    }
}

/// Statistics of one iterative value-numbering run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IgvnStats {
    /// Worklist entries processed
    pub visited: usize,
    /// Nodes removed for lack of uses
    pub removed: usize,
    /// Nodes replaced by an identity
    pub folded: usize,
    /// Nodes replaced by a structurally equal node
    pub commoned: usize,
}

/// Iterative value numbering over the whole graph.
///
/// The worklist is seeded with the nodes recorded through
/// [`Compile::record_for_igvn`] followed by every live node; whenever a node changes,
/// its users and inputs are pushed back.
#[derive(Debug, Default)]
pub struct PhaseIterGvn {
    stats: IgvnStats,
}

impl PhaseIterGvn {
    /// Creates a pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the pass to a fixed point, or until the compilation starts failing.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if the graph's edges are inconsistent.
    pub fn optimize(mut self, c: &mut Compile) -> Result<IgvnStats> {
        let mut worklist = c.take_for_igvn();
        let live: Vec<NodeId> = c.graph().live_nodes().collect();
        for id in live {
            worklist.push(id);
        }
        c.value_table.clear();

        while let Some(id) = worklist.pop() {
            if c.failing() {
                break;
            }
            if !c.graph().is_live(id) {
                continue;
            }
            self.stats.visited += 1;

            if self.detach_dead_terminator(c, id)? {
                worklist.push(c.graph().root());
            }

            let (is_dead, inputs) = {
                let graph = c.graph();
                let node = graph.node(id)?;
                let removable = !matches!(node.op(), Op::Root | Op::Top | Op::Start);
                let inputs: Vec<NodeId> = node.inputs().iter().flatten().copied().collect();
                (removable && node.outcnt() == 0, inputs)
            };

            if is_dead {
                c.remove_node(id)?;
                self.stats.removed += 1;
                c.events.record(EventKind::DeadNodeRemoved).node(id);
                for input in inputs {
                    worklist.push(input);
                }
                continue;
            }

            if let Some(same) = identity(c, id).filter(|&same| same != id) {
                self.replace(c, id, same, &inputs, &mut worklist)?;
                self.stats.folded += 1;
                c.events.record(EventKind::NodeFolded).node(id).message(format!("to {same}"));
                continue;
            }

            let key = c.graph().try_node(id).and_then(ValueKey::of);
            if let Some(key) = key {
                match lookup(c, &key, id) {
                    Some(existing) => {
                        self.replace(c, id, existing, &inputs, &mut worklist)?;
                        self.stats.commoned += 1;
                        c.events
                            .record(EventKind::NodeCommoned)
                            .node(id)
                            .message(format!("with {existing}"));
                    }
                    None => {
                        c.value_table.insert(key, id);
                    }
                }
            }
        }
        Ok(self.stats)
    }

    /// Detaches a method exit whose control is dead from the root.
    fn detach_dead_terminator(&mut self, c: &mut Compile, id: NodeId) -> Result<bool> {
        let graph = c.graph();
        let node = graph.node(id)?;
        if !node.op().is_terminator() {
            return Ok(false);
        }
        let dead = match node.input(0) {
            Some(ctrl) => ctrl == graph.top() || !graph.is_live(ctrl),
            None => true,
        };
        if !dead {
            return Ok(false);
        }
        let root = graph.root();
        while let Some(pos) = c.graph().node(root)?.inputs().iter().position(|&i| i == Some(id)) {
            c.graph_mut().del_input(root, pos)?;
        }
        Ok(true)
    }

    fn replace(
        &mut self,
        c: &mut Compile,
        old: NodeId,
        new: NodeId,
        inputs: &[NodeId],
        worklist: &mut crate::ir::UniqueNodeList,
    ) -> Result<()> {
        let users = c.graph_mut().replace_all_uses(old, new)?;
        for user in users {
            worklist.push(user);
        }
        worklist.push(new);
        for &input in inputs {
            worklist.push(input);
        }
        c.remove_node(old)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BasicType, ConValue, VectorOp},
        test::{int128_session, vt_int4},
    };

    #[test]
    fn test_transform_commons_pure_nodes() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let a = c.intcon(3)?;
        let first = c.make_vector(
            VectorOp::new(VectorOpcode::ReplicateI),
            Type::Vect(vt_int4()),
            &[a],
        )?;
        let second = c.make_vector(
            VectorOp::new(VectorOpcode::ReplicateI),
            Type::Vect(vt_int4()),
            &[a],
        )?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_phi_of_identical_values_folds() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let root = c.graph().root();
        let a = c.intcon(1)?;
        let region = c.make_region(&[root, root])?;
        let phi = c.make_phi(region, Type::scalar(BasicType::Int), &[a, a])?;
        assert_eq!(c.transform(phi)?, a);
        assert!(!c.graph().is_live(phi));
        Ok(())
    }

    #[test]
    fn test_same_type_reinterpret_folds() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let a = c.intcon(1)?;
        let v = c.make_vector(
            VectorOp::new(VectorOpcode::ReplicateI),
            Type::Vect(vt_int4()),
            &[a],
        )?;
        let same = c.make_vector(VectorOp::reinterpret(vt_int4()), Type::Vect(vt_int4()), &[v])?;
        assert_eq!(same, v);
        Ok(())
    }

    #[test]
    fn test_igvn_removes_dead_and_commons() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let dead = c.new_node(Op::Con(ConValue::Int(99)), Type::int_con(99), vec![])?;
        let a = c.intcon(5)?;
        let x = c.new_node(Op::CastPP, Type::scalar(BasicType::Int), vec![None, Some(a)])?;
        let y = c.new_node(Op::CastPP, Type::scalar(BasicType::Int), vec![None, Some(a)])?;
        let phi = c.new_node(
            Op::Phi,
            Type::scalar(BasicType::Int),
            vec![None, Some(x), Some(y)],
        )?;
        let ret = c.new_node(
            Op::Return,
            Type::Control,
            vec![Some(c.graph().top()), None, None, None, None, Some(phi)],
        )?;
        let root = c.graph().root();
        c.graph_mut().add_input(root, Some(ret))?;

        let stats = PhaseIterGvn::new().optimize(&mut c)?;
        assert!(!c.graph().is_live(dead));
        assert!(stats.removed >= 1);
        // the return has dead control, so the whole chain unravels
        assert!(!c.graph().is_live(ret));
        assert!(!c.graph().is_live(phi));
        assert_eq!(c.graph().node(root)?.req(), 0);
        Ok(())
    }

    #[test]
    fn test_igvn_folds_cast_chain() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let a = c.intcon(5)?;
        let x = c.new_node(Op::CastPP, Type::scalar(BasicType::Int), vec![None, Some(a)])?;
        let y = c.new_node(Op::CastPP, Type::scalar(BasicType::Int), vec![None, Some(a)])?;
        let region = c.make_region(&[c.graph().root(), c.graph().root()])?;
        let phi = c.make_phi(region, Type::scalar(BasicType::Int), &[x, y])?;
        let ret = c.new_node(
            Op::Return,
            Type::Control,
            vec![Some(region), None, None, None, None, Some(phi)],
        )?;
        let root = c.graph().root();
        c.graph_mut().add_input(root, Some(ret))?;

        let stats = PhaseIterGvn::new().optimize(&mut c)?;
        assert!(stats.commoned + stats.folded >= 1);
        assert!(c.graph().is_live(ret));
        let value = c.graph().input(ret, 5);
        assert!(value == Some(x) || value == Some(y) || value == Some(phi));
        assert_eq!(c.graph().count(|op| matches!(op, Op::CastPP)), 1);
        Ok(())
    }
}
