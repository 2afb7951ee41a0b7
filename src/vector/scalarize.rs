//! Scalar replacement of boxes referenced by safepoint debug info.

use crate::{
    compiler::{Compile, EventKind, GraphKit},
    ir::{NodeId, Op, Type, UniqueNodeList, CONTROL, FRAME_PTR, I_O, MEMORY},
    Error, Result,
};

use super::{box_parts, for_each_macro_node, BoxParts};

pub(super) fn scalarize_vbox_nodes(c: &mut Compile) -> Result<()> {
    if c.failing() || !c.config().enable_reboxing {
        return Ok(());
    }
    for_each_macro_node(c, |op| matches!(op, Op::VectorBox { .. }), scalarize_vbox_node)
}

/// Removes the debug-info uses of `vbox`.
///
/// With aggressive reboxing, each Java call that takes a merged box as a real
/// argument first gets a box allocation of its own, emitted right before the call.
/// Then every safepoint that references the box only for deoptimization gets a scalar
/// descriptor instead, whose single field is the raw vector value.
fn scalarize_vbox_node(c: &mut Compile, vbox: NodeId) -> Result<()> {
    let parts = box_parts(c, vbox)?;

    if c.config().aggressive_reboxing_active()
        && matches!(c.graph().op(parts.allocation), Some(Op::Phi))
    {
        let mut calls = UniqueNodeList::new();
        for user in c.graph().unique_outs(vbox) {
            let node = c.graph().node(user)?;
            if node.op().is_call_java() && node.has_non_debug_use(vbox) {
                calls.push(user);
            }
        }
        while let Some(call) = calls.pop() {
            rebox_call(c, vbox, call, parts)?;
            if c.failing() {
                return Ok(());
            }
        }
    }

    let mut safepoints = UniqueNodeList::new();
    for user in c.graph().unique_outs(vbox) {
        let node = c.graph().node(user)?;
        if !node.op().is_safepoint() {
            continue;
        }
        if !node.op().is_call_java() || !node.has_non_debug_use(vbox) {
            safepoints.push(user);
        }
    }

    while let Some(sfpt) = safepoints.pop() {
        let (req, scloff) = {
            let node = c.graph().node(sfpt)?;
            let jvms = node
                .jvms()
                .ok_or_else(|| invariant_error!("safepoint {} has no debug state", sfpt))?;
            (node.req(), jvms.scloff())
        };
        let root = c.graph().root();
        let sobj = c.new_node(
            Op::SafePointScalarObject {
                klass: parts.klass,
                first_index: (req - scloff) as u32,
                n_fields: 1,
            },
            Type::instance(parts.klass),
            vec![Some(root)],
        )?;
        c.graph_mut().add_input(sfpt, Some(parts.value))?;

        let jvms = c.graph_mut().jvms_mut(sfpt)?;
        jvms.set_endoff(req + 1);
        let (start, end) = (jvms.debug_start(), jvms.debug_end());
        let replaced = c
            .graph_mut()
            .replace_edges_in_range(sfpt, vbox, sobj, start, end)?;
        c.record_for_igvn(sfpt);
        c.events
            .record(EventKind::BoxScalarized)
            .node(vbox)
            .message(format!("{sfpt}: {replaced} references to {sobj}"));
    }
    Ok(())
}

/// Gives `call` its own box allocation in place of the merged box `vbox`.
///
/// The new allocation is emitted between the call and its control predecessor, with
/// the call's arguments pushed back on the expression stack and re-execution enabled,
/// so a deoptimization during the allocation re-executes the call.
fn rebox_call(c: &mut Compile, vbox: NodeId, call: NodeId, parts: BoxParts) -> Result<()> {
    let (method, args) = {
        let node = c.graph().node(call)?;
        let Op::CallStaticJava { method } = *node.op() else {
            return Err(Error::UnexpectedNode {
                node: call,
                expected: "CallStaticJava",
                actual: node.op().name().to_string(),
            });
        };
        let args: Vec<NodeId> = node.call_args().iter().flatten().copied().collect();
        (method, args)
    };
    let nargs = c
        .oracle()
        .method_arg_size(method)
        .ok_or(Error::UnknownMethod(method.index()))? as usize;
    if nargs != args.len() {
        return Err(invariant_error!(
            "{} passes {} arguments to {} taking {}",
            call,
            args.len(),
            method,
            nargs
        ));
    }

    let mut kit = GraphKit::from_safepoint(c, call)?;
    let new_vbox = kit.with_staged_arguments(&args, |kit| {
        kit.with_reexecute(|kit| {
            let new_vbox = kit.box_vector(parts.value, parts.klass, parts.vt)?;
            kit.replace_in_map(vbox, new_vbox);
            Ok(new_vbox)
        })
    })?;
    let ctrl = kit.control();
    let io = kit.i_o();
    let mem = kit.reset_memory()?;
    let frameptr = kit.frameptr();

    let graph = c.graph_mut();
    graph.set_input(call, CONTROL, Some(ctrl))?;
    graph.set_input(call, I_O, Some(io))?;
    graph.set_input(call, MEMORY, Some(mem))?;
    graph.set_input(call, FRAME_PTR, Some(frameptr))?;
    graph.replace_edge(call, vbox, new_vbox)?;
    c.record_for_igvn(call);
    c.events
        .record(EventKind::BoxReboxed)
        .node(call)
        .message(format!("{vbox} replaced by {new_vbox}"));
    Ok(())
}
