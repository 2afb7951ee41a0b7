//! Removal of box allocations that no data use needs.

use std::collections::HashSet;

use crate::{
    compiler::{Compile, EventKind, GraphKit},
    ir::{NodeId, Op, ProjKind},
    Result,
};

use super::for_each_macro_node;

pub(super) fn eliminate_vbox_alloc_nodes(c: &mut Compile) -> Result<()> {
    for_each_macro_node(
        c,
        |op| matches!(op, Op::VectorBoxAllocate { .. }),
        eliminate_vbox_alloc_node,
    )
}

/// Replaces the allocation call `vba` by a safepoint carrying its debug state.
///
/// Every box over `vba` has been expanded or removed by now, so its result may only
/// feed merges that nothing reads anymore; those become top and are left to cleanup.
fn eliminate_vbox_alloc_node(c: &mut Compile, vba: NodeId) -> Result<()> {
    let result = c.graph().find_proj(vba, ProjKind::Result);
    if let Some(user) = result.and_then(|proj| live_data_use(c, proj)) {
        return Err(invariant_error!(
            "result of {} is still read by {} ({})",
            vba,
            user,
            c.graph().op(user).map_or("?", Op::name)
        ));
    }
    let top = c.graph().top();
    let mut kit = GraphKit::from_safepoint(c, vba)?;
    let safepoint = kit.make_safepoint()?;
    kit.replace_call(vba, Some(top))?;
    c.remove_macro_node(vba);
    c.events
        .record(EventKind::AllocationEliminated)
        .node(vba)
        .message(format!("replaced by {safepoint}"));
    Ok(())
}

/// Returns a user of `value` that is not a merge ending in no uses.
fn live_data_use(c: &Compile, value: NodeId) -> Option<NodeId> {
    let graph = c.graph();
    let mut seen = HashSet::new();
    let mut stack = vec![value];
    while let Some(n) = stack.pop() {
        for &user in graph.outs(n) {
            if !matches!(graph.op(user), Some(Op::Phi)) {
                return Some(user);
            }
            if seen.insert(user) {
                stack.push(user);
            }
        }
    }
    None
}
