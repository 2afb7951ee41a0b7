//! Expansion of boxes into concrete array-backed objects.

use crate::{
    compiler::{Compile, EventKind, GraphKit},
    ir::{AliasClass, BasicType, NodeId, Op, ProjKind, Type, TypeVect, VectorOp},
    meta::{KlassId, VectorFamily},
    Error, Result,
};

use super::{box_parts, for_each_macro_node};

pub(super) fn expand_vbox_nodes(c: &mut Compile) -> Result<()> {
    for_each_macro_node(c, |op| matches!(op, Op::VectorBox { .. }), expand_vbox_node)
}

/// Replaces `vbox` by the object its allocation input materializes.
fn expand_vbox_node(c: &mut Compile, vbox: NodeId) -> Result<()> {
    if c.graph().outcnt(vbox) > 0 {
        let parts = box_parts(c, vbox)?;
        let result =
            expand_vbox_node_helper(c, parts.allocation, parts.value, parts.klass, parts.vt, 0)?;
        if c.failing() {
            return Ok(());
        }
        c.gvn_replace_by(vbox, result)?;
        c.events
            .record(EventKind::BoxExpanded)
            .node(vbox)
            .message(format!("into {result}"));
    }
    c.remove_macro_node(vbox);
    c.remove_node(vbox)
}

/// Materializes the allocation `alloc` of a box holding `value`.
///
/// Merged allocations are expanded path by path into a new merge; the value must be
/// merged over the same region.
fn expand_vbox_node_helper(
    c: &mut Compile,
    alloc: NodeId,
    value: NodeId,
    klass: KlassId,
    vt: TypeVect,
    depth: usize,
) -> Result<NodeId> {
    if depth > c.config().max_merge_depth {
        return Err(Error::RecursionLimit(depth));
    }
    let graph = c.graph();
    let alloc_node = graph.node(alloc)?;
    match alloc_node.op() {
        Op::Phi => {
            let value_node = graph.node(value)?;
            if !matches!(value_node.op(), Op::Phi) {
                return Err(Error::MergeMismatch {
                    node: alloc,
                    message: format!(
                        "allocation merge {alloc} holds the unmerged value {value} ({})",
                        value_node.op().name()
                    ),
                });
            }
            let region = alloc_node.input(0);
            if region != value_node.input(0) || alloc_node.req() != value_node.req() {
                return Err(Error::MergeMismatch {
                    node: alloc,
                    message: format!(
                        "allocation merge {alloc} over {:?} with {} paths, \
                         value merge {value} over {:?} with {} paths",
                        region,
                        alloc_node.req() - 1,
                        value_node.input(0),
                        value_node.req() - 1
                    ),
                });
            }
            let paths = alloc_node.req();

            // Lowering a path rewires later inputs of this merge that reach the same
            // allocation; read each path only when it is reached.
            let mut inputs = vec![region];
            for i in 1..paths {
                if c.failing() {
                    return Ok(alloc);
                }
                let graph = c.graph();
                let (Some(path_alloc), Some(path_value)) =
                    (graph.input(alloc, i), graph.input(value, i))
                else {
                    return Err(Error::MergeMismatch {
                        node: alloc,
                        message: format!("path {i} of {alloc} or {value} is missing"),
                    });
                };
                let expanded =
                    expand_vbox_node_helper(c, path_alloc, path_value, klass, vt, depth + 1)?;
                inputs.push(Some(expanded));
            }
            if c.failing() {
                return Ok(alloc);
            }
            let phi = c.new_node(Op::Phi, Type::instance(klass), inputs)?;
            c.transform(phi)
        }
        Op::Proj(ProjKind::Result) => {
            let owner = alloc_node.input(0);
            match owner {
                Some(call) if matches!(graph.op(call), Some(Op::VectorBoxAllocate { .. })) => {
                    expand_vbox_alloc_node(c, call, value, klass, vt)
                }
                _ => Ok(reuse_expanded(c, alloc)),
            }
        }
        _ => Ok(reuse_expanded(c, alloc)),
    }
}

// The object was materialized for another box over the same allocation. Its payload
// is assumed to hold the same value; nothing checks that here.
fn reuse_expanded(c: &Compile, alloc: NodeId) -> NodeId {
    c.events
        .record(EventKind::ExpandedBoxReused)
        .node(alloc)
        .message("payload not revalidated");
    alloc
}

/// Lowers the pending allocation call `vba` to an initialized box object holding
/// `value`.
///
/// ```text
/// AllocateArray(bt, lanes) ─► StoreVector(elem 0, value)
/// Allocate(box)            ─► Store(payload, array)
/// ```
///
/// The call is replaced by the state after the second store.
fn expand_vbox_alloc_node(
    c: &mut Compile,
    vba: NodeId,
    value: NodeId,
    klass: KlassId,
    vt: TypeVect,
) -> Result<NodeId> {
    let family = c.oracle().vector_family(klass).ok_or_else(|| Error::TypeMismatch {
        node: vba,
        expected: "boxed vector, mask or shuffle".to_string(),
        actual: klass.to_string(),
    })?;
    let field = c.oracle().payload_field()?;

    let mut kit = GraphKit::from_safepoint(c, vba)?;
    let mut bt = vt.element_basic_type();
    let mut value = value;
    if family == VectorFamily::Mask && bt != BasicType::Boolean {
        // masks are stored as one boolean per lane regardless of their lane type
        value = kit.compile().make_vector(
            VectorOp::store_mask(bt),
            Type::Vect(vt.with_element(BasicType::Boolean)),
            &[value],
        )?;
        bt = BasicType::Boolean;
    }

    let arr = kit.new_array(bt, vt.length())?;
    let arr_adr = kit.compile().array_element_address(arr, 0, bt)?;
    let arr_alias = match kit.graph().ty(arr_adr) {
        Type::Address(alias) => alias,
        _ => AliasClass::Bottom,
    };
    kit.store_vector(arr_adr, value, arr_alias)?;
    kit.compile().raise_max_vector_size(vt.length_in_bytes());

    let vec_obj = kit.new_instance(klass)?;
    let field_adr = kit.compile().field_address(vec_obj, &field)?;
    let field_alias = AliasClass::Field {
        holder: field.holder,
        offset: field.offset_in_bytes,
    };
    kit.store(field_adr, arr, field_alias)?;

    kit.replace_call(vba, Some(vec_obj))?;
    c.remove_macro_node(vba);
    c.events
        .record(EventKind::AllocationLowered)
        .node(vba)
        .message(format!("{bt}[{}] in {vec_obj}", vt.length()));
    Ok(vec_obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::VectorConfig,
        ir::STORED_VALUE,
        test::{
            boxed_double_fixture, merged_box_call, session_with, NestedMerge, SharedAllocation,
        },
    };

    #[test]
    fn test_allocation_lowered_once_for_two_uses() -> Result<()> {
        let (mut c, classes) = session_with(VectorConfig::new())?;
        let fx = boxed_double_fixture(&mut c, &classes)?;
        expand_vbox_nodes(&mut c)?;

        let graph = c.graph();
        assert!(!graph.is_live(fx.allocation));
        assert!(!graph.is_live(fx.vbox));
        assert_eq!(graph.count(|op| matches!(op, Op::AllocateArray)), 1);
        assert_eq!(graph.count(|op| matches!(op, Op::Allocate)), 1);
        assert_eq!(graph.count(|op| matches!(op, Op::StoreVector { .. })), 1);
        assert_eq!(graph.count(|op| matches!(op, Op::Store { .. })), 1);
        assert_eq!(c.max_vector_size(), 64);

        let obj = graph.input(fx.first_use, fx.use_slot).ok_or(Error::InvalidNode(fx.first_use))?;
        assert_eq!(graph.input(fx.second_use, fx.use_slot), Some(obj));
        assert_eq!(graph.ty(obj), Type::instance(classes.double_vector));
        assert!(!c.macro_nodes().any(|n| n == fx.allocation || n == fx.vbox));
        Ok(())
    }

    #[test]
    fn test_vector_store_holds_value() -> Result<()> {
        let (mut c, classes) = session_with(VectorConfig::new())?;
        let fx = boxed_double_fixture(&mut c, &classes)?;
        expand_vbox_nodes(&mut c)?;

        let graph = c.graph();
        let store = graph
            .live_nodes()
            .find(|&n| matches!(graph.op(n), Some(Op::StoreVector { .. })))
            .ok_or(Error::InvalidNode(fx.vbox))?;
        assert_eq!(graph.input(store, STORED_VALUE), Some(fx.value));
        let alloc = graph
            .live_nodes()
            .find(|&n| matches!(graph.op(n), Some(Op::AllocateArray)))
            .ok_or(Error::InvalidNode(fx.vbox))?;
        let length = graph
            .node(alloc)?
            .inputs()
            .last()
            .copied()
            .flatten()
            .ok_or(Error::InvalidNode(alloc))?;
        assert_eq!(graph.ty(length).get_con(), Some(8));
        Ok(())
    }

    #[test]
    fn test_merged_allocations_expand_per_path() -> Result<()> {
        let (mut c, classes) = session_with(VectorConfig::new())?;
        let fx = merged_box_call(&mut c, &classes)?;
        expand_vbox_nodes(&mut c)?;

        let arg = c.graph().node(fx.call)?.call_args()[0].ok_or(Error::InvalidNode(fx.call))?;
        let phi = c.graph().node(arg)?;
        assert!(matches!(phi.op(), Op::Phi));
        assert_eq!(phi.input(0), Some(fx.region));
        assert_eq!(c.graph().count(|op| matches!(op, Op::AllocateArray)), 2);
        assert!(fx.allocations.iter().all(|&a| !c.graph().is_live(a)));
        Ok(())
    }

    #[test]
    fn test_merge_mismatch_names_node() -> Result<()> {
        let (mut c, classes) = session_with(VectorConfig::new())?;
        let fx = merged_box_call(&mut c, &classes)?;
        let parts = box_parts(&c, fx.vbox)?;
        let err = expand_vbox_node_helper(
            &mut c,
            parts.allocation,
            fx.unmerged_value,
            parts.klass,
            parts.vt,
            0,
        )
        .err();
        assert!(matches!(err, Some(Error::MergeMismatch { node, .. }) if node == parts.allocation));
        Ok(())
    }

    #[test]
    fn test_merge_depth_limited() -> Result<()> {
        let (mut c, classes) = session_with(VectorConfig::new().with_max_merge_depth(1))?;
        let fx = NestedMerge::build(&mut c, &classes, 3)?;
        let parts = box_parts(&c, fx.vbox)?;
        let err =
            expand_vbox_node_helper(&mut c, parts.allocation, parts.value, parts.klass, parts.vt, 0)
                .err();
        assert!(matches!(err, Some(Error::RecursionLimit(2))));
        Ok(())
    }

    #[test]
    fn test_allocation_shared_by_two_paths_lowered_once() -> Result<()> {
        let (mut c, classes) = session_with(VectorConfig::new())?;
        let fx = SharedAllocation::build(&mut c, &classes)?;
        expand_vbox_nodes(&mut c)?;

        assert!(!c.failing());
        let graph = c.graph();
        assert!(!graph.is_live(fx.shared));
        assert!(!graph.is_live(fx.other));
        assert_eq!(graph.count(|op| matches!(op, Op::AllocateArray)), 2);
        assert_eq!(graph.count(|op| matches!(op, Op::Allocate)), 2);
        assert_eq!(c.events.count(EventKind::AllocationLowered), 2);
        assert_eq!(c.events.count(EventKind::ExpandedBoxReused), 1);

        let arg = graph.node(fx.call)?.call_args()[0].ok_or(Error::InvalidNode(fx.call))?;
        let outer = graph.node(arg)?;
        assert!(matches!(outer.op(), Op::Phi));
        let inner_merge = outer.input(1).ok_or(Error::InvalidNode(arg))?;
        let inner = graph.node(inner_merge)?;
        assert!(matches!(inner.op(), Op::Phi));
        let shared_obj = inner.input(1).ok_or(Error::InvalidNode(inner_merge))?;
        assert!(matches!(graph.op(shared_obj), Some(Op::CheckCastPP)));
        assert_eq!(outer.input(2), Some(shared_obj));
        assert_ne!(inner.input(2), Some(shared_obj));
        Ok(())
    }

    #[test]
    fn test_shared_allocation_stores_its_own_value() -> Result<()> {
        let (mut c, classes) = session_with(VectorConfig::new())?;
        let fx = SharedAllocation::build(&mut c, &classes)?;
        expand_vbox_nodes(&mut c)?;

        let graph = c.graph();
        let stored: Vec<_> = graph
            .live_nodes()
            .filter(|&n| matches!(graph.op(n), Some(Op::StoreVector { .. })))
            .filter_map(|n| graph.input(n, STORED_VALUE))
            .collect();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.iter().filter(|&&v| v == fx.shared_value).count(), 1);
        Ok(())
    }

    #[test]
    fn test_merge_expansion_stops_when_failing() -> Result<()> {
        let (mut c, classes) = session_with(VectorConfig::new())?;
        let fx = merged_box_call(&mut c, &classes)?;
        let parts = box_parts(&c, fx.vbox)?;
        c.record_failure("out of nodes".to_string());

        let (alloc, value) = (parts.allocation, parts.value);
        let result = expand_vbox_node_helper(&mut c, alloc, value, parts.klass, parts.vt, 0)?;
        assert_eq!(result, parts.allocation);
        assert!(fx.allocations.iter().all(|&a| c.graph().is_live(a)));
        assert_eq!(c.graph().count(|op| matches!(op, Op::AllocateArray)), 0);
        Ok(())
    }
}
