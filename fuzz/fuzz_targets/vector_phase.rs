#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use vecbox::{
    compiler::{Compile, GraphKit, VectorConfig},
    ir::{AliasClass, BasicType, JvmState, NodeId, Op, Type, TypeVect, VectorOp, VectorOpcode},
    meta::{ClassRegistry, KlassId, WellKnownClass},
    vector::PhaseVector,
    Result,
};

const LANE_TYPES: [BasicType; 6] = [
    BasicType::Byte,
    BasicType::Short,
    BasicType::Int,
    BasicType::Long,
    BasicType::Float,
    BasicType::Double,
];

fn run(data: &[u8]) -> Result<()> {
    let Some((&flags, ops)) = data.split_first() else {
        return Ok(());
    };
    let mut registry = ClassRegistry::with_vector_classes();
    let vector = registry.define_class("AnyVector", WellKnownClass::Vector)?;
    let mask = registry.define_class("AnyMask", WellKnownClass::VectorMask)?;
    let shuffle = registry.define_class("AnyShuffle", WellKnownClass::VectorShuffle)?;
    let holder = registry.define_class("Fuzz", WellKnownClass::Object)?;
    let method = registry.define_method(holder, "run", 1)?;
    let consume = registry.define_method(holder, "consume", 1)?;
    let families: [KlassId; 3] = [vector, mask, shuffle];

    let config = VectorConfig::new()
        .with_reboxing(flags & 1 != 0, flags & 2 != 0)
        .with_compaction(flags & 4 != 0)
        .with_max_nodes(if flags & 8 != 0 { 200 } else { 80_000 })
        .with_verification(true);
    let mut c = Compile::new(Arc::new(registry), config);

    {
        let parms = [Type::scalar(BasicType::Long), Type::instance(vector)];
        let jvms = JvmState::new(method, 0, 0, 2, 0, 0);
        let (mut kit, parms) = GraphKit::at_method_entry(&mut c, &parms, jvms)?;
        let mut boxes: Vec<(NodeId, KlassId, TypeVect)> = Vec::new();

        for chunk in ops.chunks(2).take(32) {
            let (op, arg) = (chunk[0], chunk.get(1).copied().unwrap_or(0));
            match op % 4 {
                0 => {
                    let bt = LANE_TYPES[arg as usize % LANE_TYPES.len()];
                    let vt = TypeVect::new(bt, 2 << (arg / 16 % 4));
                    let Some(opcode) = VectorOpcode::replicate(bt) else {
                        continue;
                    };
                    let value = kit.compile().make_vector(
                        VectorOp::new(opcode),
                        Type::Vect(vt),
                        &[parms[0]],
                    )?;
                    let klass = families[(op as usize / 4) % families.len()];
                    let (_, obj) = kit.make_vector_box_allocate(klass)?;
                    let vbox = kit.compile().make_vector_box(obj, value, klass, vt)?;
                    boxes.push((vbox, klass, vt));
                }
                1 if !boxes.is_empty() => {
                    let (vbox, _, _) = boxes[arg as usize % boxes.len()];
                    kit.make_call_static_java(consume, &[vbox], Type::scalar(BasicType::Int))?;
                }
                2 if !boxes.is_empty() => {
                    let (vbox, _, _) = boxes[arg as usize % boxes.len()];
                    kit.set_local(usize::from(arg & 1), Some(vbox))?;
                    kit.make_safepoint()?;
                }
                _ => {
                    let (obj, vt) = match boxes.get(arg as usize % boxes.len().max(1)) {
                        Some(&(vbox, _, vt)) if op & 4 != 0 => (vbox, vt),
                        _ => (parms[1], TypeVect::new(BasicType::Int, 4)),
                    };
                    let mem = kit.memory(AliasClass::Bottom)?;
                    let ctrl = kit.control();
                    let unbox = kit.compile().make_vector_unbox(
                        Some(ctrl),
                        mem,
                        obj,
                        vt,
                        op & 8 != 0,
                    )?;
                    if op & 16 != 0 {
                        kit.make_call_static_java(consume, &[unbox], Type::scalar(BasicType::Int))?;
                    }
                }
            }
        }
        kit.return_value(None)?;
    }

    let stats = PhaseVector::new().optimize_vector_boxes(&mut c)?;
    if !stats.bailed_out {
        let pending = c.graph().count(|op| {
            matches!(
                op,
                Op::VectorBox { .. } | Op::VectorUnbox { .. } | Op::VectorBoxAllocate { .. }
            )
        });
        assert_eq!(pending, 0);
    }
    Ok(())
}

fuzz_target!(|data: &[u8]| {
    // graph construction and the phase may reject inputs; they must never panic
    let _ = run(data);
});
