//! Expansion of unbox nodes into payload loads.

use crate::{
    compiler::{Compile, EventKind},
    ir::{
        AliasClass, BasicType, NodeId, Op, OopType, Type, TypeVect, VectorOp, VectorOpcode, MEM,
        OBJ,
    },
    meta::{VectorFamily, WellKnownClass},
    Error, Result,
};

use super::for_each_macro_node;

pub(super) fn expand_vunbox_nodes(c: &mut Compile) -> Result<()> {
    for_each_macro_node(
        c,
        |op| matches!(op, Op::VectorUnbox { .. }),
        expand_vunbox_node,
    )
}

/// Replaces `unbox` by a load of its object's payload array.
///
/// ```text
/// Load(obj + payload) ─► CastPP(bt[] not null) ─► AddP(+elem 0) ─► LoadVector
///   LoadVector ─► VectorLoadMask | VectorLoadShuffle | VectorCastB2X
/// ```
///
/// Masks are stored one boolean per lane and shuffles one byte per lane, so their
/// loads are widened back to the requested lane type.
fn expand_vunbox_node(c: &mut Compile, unbox: NodeId) -> Result<()> {
    if c.graph().outcnt(unbox) == 0 {
        c.remove_macro_node(unbox);
        c.remove_node(unbox)?;
        c.events.record(EventKind::UnboxRemoved).node(unbox);
        return Ok(());
    }

    let node = c.graph().node(unbox)?;
    let Op::VectorUnbox { shuffle_to_vector } = *node.op() else {
        return Err(Error::UnexpectedNode {
            node: unbox,
            expected: "VectorUnbox",
            actual: node.op().name().to_string(),
        });
    };
    let vt = node.vect_type().ok_or_else(|| Error::TypeMismatch {
        node: unbox,
        expected: "vector".to_string(),
        actual: node.ty().to_string(),
    })?;
    let ctrl = node.input(0);
    let mem = node
        .input(MEM)
        .ok_or_else(|| invariant_error!("{} has no memory input", unbox))?;
    let obj = node
        .input(OBJ)
        .ok_or_else(|| invariant_error!("{} has no object input", unbox))?;

    let (_, family) = c.vector_family_of(obj)?;
    let lane_type = vt.element_basic_type();
    let storage = match family {
        VectorFamily::Mask => BasicType::Boolean,
        VectorFamily::Shuffle => BasicType::Byte,
        VectorFamily::Vector => lane_type,
    };

    let field = c.oracle().payload_field()?;
    let field_adr = c.field_address(obj, &field)?;
    let object_ty = c
        .oracle()
        .well_known(WellKnownClass::Object)
        .map_or(Type::Bottom, |klass| {
            Type::Oop(OopType::Instance {
                klass,
                not_null: false,
            })
        });
    let field_alias = AliasClass::Field {
        holder: field.holder,
        offset: field.offset_in_bytes,
    };
    let payload = c.new_node(
        Op::Load { alias: field_alias },
        object_ty,
        vec![ctrl, Some(mem), Some(field_adr)],
    )?;
    let payload = c.transform(payload)?;

    // the precise array type gives the element address its own alias class
    let array = c.new_node(Op::CastPP, Type::array(storage), vec![None, Some(payload)])?;
    let array = c.transform(array)?;
    let adr = c.array_element_address(array, 0, storage)?;
    let alias = match c.graph().ty(adr) {
        Type::Address(alias) => alias,
        _ => AliasClass::Bottom,
    };
    let load = c.new_node(
        Op::LoadVector { alias },
        Type::Vect(TypeVect::new(storage, vt.length())),
        vec![ctrl, Some(mem), Some(adr)],
    )?;
    let mut value = c.transform(load)?;
    c.raise_max_vector_size(vt.length_in_bytes());

    let conversion = match family {
        VectorFamily::Mask if lane_type != BasicType::Boolean => Some(VectorOpcode::VectorLoadMask),
        VectorFamily::Shuffle if !shuffle_to_vector => Some(VectorOpcode::VectorLoadShuffle),
        VectorFamily::Shuffle if lane_type != BasicType::Byte => Some(VectorOpcode::VectorCastB2X),
        _ => None,
    };
    if let Some(opcode) = conversion {
        value = c.make_vector(VectorOp::new(opcode), Type::Vect(vt), &[value])?;
    }

    c.graph_mut().disconnect_inputs(unbox)?;
    c.gvn_replace_by(unbox, value)?;
    c.remove_macro_node(unbox);
    c.remove_node(unbox)?;
    c.events
        .record(EventKind::UnboxExpanded)
        .node(unbox)
        .message(format!("{family} as {storage}[{}], value {value}", vt.length()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{int128_session, unbox_fixture};

    #[test]
    fn test_zero_use_unbox_removed() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let vt = TypeVect::new(BasicType::Int, 4);
        let fx = unbox_fixture(&mut c, classes.int_vector, vt, false, false)?;
        expand_vunbox_nodes(&mut c)?;
        assert!(!c.graph().is_live(fx.unbox));
        assert_eq!(c.graph().count(|op| matches!(op, Op::LoadVector { .. } | Op::Load { .. })), 0);
        assert_eq!(c.events.count(EventKind::UnboxRemoved), 1);
        assert_eq!(c.max_vector_size(), 0);
        Ok(())
    }

    #[test]
    fn test_vector_unbox_loads_payload() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let vt = TypeVect::new(BasicType::Int, 4);
        let fx = unbox_fixture(&mut c, classes.int_vector, vt, false, true)?;
        expand_vunbox_nodes(&mut c)?;

        let value = fx.consumed(&c)?;
        assert!(matches!(
            c.graph().op(value),
            Some(Op::LoadVector { alias: AliasClass::ArrayElement(BasicType::Int) })
        ));
        assert_eq!(c.graph().ty(value), Type::Vect(vt));
        assert_eq!(c.max_vector_size(), 16);
        assert!(!c.graph().is_live(fx.unbox));
        assert_eq!(c.macro_nodes().filter(|&n| n == fx.unbox).count(), 0);
        Ok(())
    }

    #[test]
    fn test_mask_unbox_converts_lanes() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let vt = TypeVect::new(BasicType::Int, 4);
        let fx = unbox_fixture(&mut c, classes.int_mask, vt, false, true)?;
        expand_vunbox_nodes(&mut c)?;

        let value = fx.consumed(&c)?;
        assert!(matches!(
            c.graph().op(value),
            Some(Op::Vector(op)) if op.opcode == VectorOpcode::VectorLoadMask
        ));
        let raw = c.graph().input(value, 1).ok_or(Error::InvalidNode(value))?;
        assert_eq!(c.graph().ty(raw), Type::Vect(TypeVect::new(BasicType::Boolean, 4)));
        Ok(())
    }

    #[test]
    fn test_shuffle_to_vector_casts_bytes() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let vt = TypeVect::new(BasicType::Int, 4);
        let fx = unbox_fixture(&mut c, classes.int_shuffle, vt, true, true)?;
        expand_vunbox_nodes(&mut c)?;

        let casts = c.graph().count(|op| {
            matches!(op, Op::Vector(v) if v.opcode == VectorOpcode::VectorCastB2X)
        });
        assert_eq!(casts, 1);
        let value = fx.consumed(&c)?;
        let raw = c.graph().input(value, 1).ok_or(Error::InvalidNode(value))?;
        assert!(matches!(c.graph().op(raw), Some(Op::LoadVector { .. })));
        assert_eq!(c.graph().ty(raw), Type::Vect(TypeVect::new(BasicType::Byte, 4)));
        Ok(())
    }

    #[test]
    fn test_shuffle_unbox_loads_shuffle() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let vt = TypeVect::new(BasicType::Int, 4);
        let fx = unbox_fixture(&mut c, classes.int_shuffle, vt, false, true)?;
        expand_vunbox_nodes(&mut c)?;
        let value = fx.consumed(&c)?;
        assert!(matches!(
            c.graph().op(value),
            Some(Op::Vector(op)) if op.opcode == VectorOpcode::VectorLoadShuffle
        ));
        Ok(())
    }
}
