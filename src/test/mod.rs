//! Graph fixtures shared by the unit tests.
//!
//! Every builder starts a method at a fresh entry point of the given session, so a
//! session may hold several fixtures side by side.

use std::sync::Arc;

use crate::{
    compiler::{Compile, GraphKit, VectorConfig},
    ir::{AliasClass, BasicType, JvmState, NodeId, Type, TypeVect, VectorOp, VectorOpcode, PARMS},
    meta::{ClassRegistry, KlassId, MethodId, WellKnownClass},
    Error, Result,
};

/// Box classes and methods registered for the fixtures.
#[derive(Debug, Clone, Copy)]
pub struct VectorClasses {
    pub int_vector: KlassId,
    pub double_vector: KlassId,
    pub int_mask: KlassId,
    pub int_shuffle: KlassId,
    pub holder: KlassId,
    /// The method being compiled
    pub method: MethodId,
    /// A callee taking one argument
    pub consume_one: MethodId,
}

/// Creates a registry with one concrete class per boxed-vector family.
pub fn vector_registry() -> Result<(ClassRegistry, VectorClasses)> {
    let mut registry = ClassRegistry::with_vector_classes();
    let int_vector =
        registry.define_class("jdk.incubator.vector.Int128Vector", WellKnownClass::Vector)?;
    let double_vector =
        registry.define_class("jdk.incubator.vector.Double512Vector", WellKnownClass::Vector)?;
    let int_mask = registry.define_class(
        "jdk.incubator.vector.Int128Vector$Int128Mask",
        WellKnownClass::VectorMask,
    )?;
    let int_shuffle = registry.define_class(
        "jdk.incubator.vector.Int128Vector$Int128Shuffle",
        WellKnownClass::VectorShuffle,
    )?;
    let holder = registry.define_class("Kernel", WellKnownClass::Object)?;
    let method = registry.define_method(holder, "run", 2)?;
    let consume_one = registry.define_method(holder, "consume", 1)?;
    Ok((
        registry,
        VectorClasses {
            int_vector,
            double_vector,
            int_mask,
            int_shuffle,
            holder,
            method,
            consume_one,
        },
    ))
}

pub fn session_with(config: VectorConfig) -> Result<(Compile, VectorClasses)> {
    let (registry, classes) = vector_registry()?;
    Ok((Compile::new(Arc::new(registry), config), classes))
}

pub fn int128_session() -> Result<(Compile, VectorClasses)> {
    session_with(VectorConfig::new())
}

pub fn vt_int4() -> TypeVect {
    TypeVect::new(BasicType::Int, 4)
}

fn frame(classes: &VectorClasses, nlocals: usize) -> JvmState {
    JvmState::new(classes.method, 0, 0, nlocals, 0, 0)
}

fn replicate(kit: &mut GraphKit<'_>, scalar: NodeId, vt: TypeVect) -> Result<NodeId> {
    let bt = vt.element_basic_type();
    let opcode = VectorOpcode::replicate(bt)
        .ok_or_else(|| invariant_error!("no replicate for {}", bt))?;
    kit.compile().make_vector(VectorOp::new(opcode), Type::Vect(vt), &[scalar])
}

pub struct UnboxFixture {
    pub unbox: NodeId,
    /// The return reading the unboxed value, or returning nothing
    pub consumer: NodeId,
    pub consumer_slot: usize,
}

impl UnboxFixture {
    /// Returns the value the consumer reads.
    pub fn consumed(&self, c: &Compile) -> Result<NodeId> {
        c.graph()
            .input(self.consumer, self.consumer_slot)
            .ok_or(Error::InvalidNode(self.consumer))
    }
}

/// Builds `return unbox(parm0)` for a parameter of class `klass`.
pub fn unbox_fixture(
    c: &mut Compile,
    klass: KlassId,
    vt: TypeVect,
    shuffle_to_vector: bool,
    with_use: bool,
) -> Result<UnboxFixture> {
    let jvms = JvmState::new(MethodId::new(0), 0, 0, 0, 0, 0);
    let (mut kit, parms) = GraphKit::at_method_entry(c, &[Type::instance(klass)], jvms)?;
    let mem = kit.memory(AliasClass::Bottom)?;
    let ctrl = kit.control();
    let unbox = kit
        .compile()
        .make_vector_unbox(Some(ctrl), mem, parms[0], vt, shuffle_to_vector)?;
    let consumer = kit.return_value(with_use.then_some(unbox))?;
    Ok(UnboxFixture {
        unbox,
        consumer,
        consumer_slot: PARMS,
    })
}

pub struct DebugBoxFixture {
    pub vbox: NodeId,
    pub value: NodeId,
    pub allocation: NodeId,
    pub safepoint: NodeId,
}

/// Builds a box of four ints that only a safepoint's local 0 refers to.
pub fn debug_only_box(c: &mut Compile, classes: &VectorClasses) -> Result<DebugBoxFixture> {
    let (mut kit, parms) =
        GraphKit::at_method_entry(c, &[Type::scalar(BasicType::Int)], frame(classes, 1))?;
    let value = replicate(&mut kit, parms[0], vt_int4())?;
    let (allocation, obj) = kit.make_vector_box_allocate(classes.int_vector)?;
    let vbox = kit
        .compile()
        .make_vector_box(obj, value, classes.int_vector, vt_int4())?;
    kit.set_local(0, Some(vbox))?;
    let safepoint = kit.make_safepoint()?;
    kit.return_value(None)?;
    Ok(DebugBoxFixture {
        vbox,
        value,
        allocation,
        safepoint,
    })
}

pub struct BoxedDoubleFixture {
    pub vbox: NodeId,
    pub value: NodeId,
    pub allocation: NodeId,
    pub first_use: NodeId,
    pub second_use: NodeId,
    /// Input of both calls that receives the box
    pub use_slot: usize,
}

/// Builds a box of eight doubles passed to two calls.
pub fn boxed_double_fixture(
    c: &mut Compile,
    classes: &VectorClasses,
) -> Result<BoxedDoubleFixture> {
    let vt = TypeVect::new(BasicType::Double, 8);
    let (mut kit, parms) =
        GraphKit::at_method_entry(c, &[Type::scalar(BasicType::Double)], frame(classes, 1))?;
    let value = replicate(&mut kit, parms[0], vt)?;
    let (allocation, obj) = kit.make_vector_box_allocate(classes.double_vector)?;
    let vbox = kit
        .compile()
        .make_vector_box(obj, value, classes.double_vector, vt)?;
    let int = Type::scalar(BasicType::Int);
    let (first_use, _) = kit.make_call_static_java(classes.consume_one, &[vbox], int)?;
    let (second_use, _) = kit.make_call_static_java(classes.consume_one, &[vbox], int)?;
    kit.return_value(None)?;
    Ok(BoxedDoubleFixture {
        vbox,
        value,
        allocation,
        first_use,
        second_use,
        use_slot: PARMS,
    })
}

pub struct BareAllocation {
    pub allocation: NodeId,
    /// The return following the allocation
    pub exit: NodeId,
}

impl BareAllocation {
    /// Builds a pending allocation with no box over it, optionally returning its
    /// result.
    pub fn build(c: &mut Compile, classes: &VectorClasses, return_result: bool) -> Result<Self> {
        let (mut kit, _) = GraphKit::at_method_entry(c, &[], frame(classes, 1))?;
        let (allocation, obj) = kit.make_vector_box_allocate(classes.int_vector)?;
        let exit = kit.return_value(return_result.then_some(obj))?;
        Ok(Self { allocation, exit })
    }
}

/// A box over merged allocations, passed as argument to a call.
pub struct NestedMerge {
    pub vbox: NodeId,
    pub call: NodeId,
    /// Innermost region first
    pub regions: Vec<NodeId>,
    pub allocations: Vec<NodeId>,
    /// Value of the first leaf, which is not a merge
    pub leaf_value: NodeId,
}

impl NestedMerge {
    /// Builds a box whose allocation is `depth` merges deep along its first path.
    ///
    /// Each merge joins the next deeper one with a fresh allocation; the values are
    /// merged over the same regions. The box is kept in local 0 and passed to a call.
    pub fn build(c: &mut Compile, classes: &VectorClasses, depth: usize) -> Result<Self> {
        let (mut kit, parms) = GraphKit::at_method_entry(
            c,
            &[Type::scalar(BasicType::Int), Type::scalar(BasicType::Boolean)],
            frame(classes, 1),
        )?;
        let mut merge = Self {
            vbox: parms[0],
            call: parms[0],
            regions: Vec::new(),
            allocations: Vec::new(),
            leaf_value: parms[0],
        };
        let mut seed = 0;
        let (obj, value) = merge.branch(&mut kit, classes, parms[1], depth, &mut seed)?;
        merge.vbox = kit
            .compile()
            .make_vector_box(obj, value, classes.int_vector, vt_int4())?;
        kit.set_local(0, Some(merge.vbox))?;
        let (call, _) = kit.make_call_static_java(
            classes.consume_one,
            &[merge.vbox],
            Type::scalar(BasicType::Int),
        )?;
        merge.call = call;
        kit.return_value(None)?;
        Ok(merge)
    }

    fn branch(
        &mut self,
        kit: &mut GraphKit<'_>,
        classes: &VectorClasses,
        cond: NodeId,
        depth: usize,
        seed: &mut i32,
    ) -> Result<(NodeId, NodeId)> {
        if depth == 0 {
            *seed += 1;
            let scalar = kit.compile().intcon(*seed)?;
            let value = replicate(kit, scalar, vt_int4())?;
            let (allocation, obj) = kit.make_vector_box_allocate(classes.int_vector)?;
            if self.allocations.is_empty() {
                self.leaf_value = value;
            }
            self.allocations.push(allocation);
            return Ok((obj, value));
        }

        let io = kit.i_o();
        let mem = kit.reset_memory()?;
        let ctrl = kit.control();
        let (taken, not_taken) = kit.compile().make_if(ctrl, cond)?;

        kit.set_control(taken);
        let (obj_a, value_a) = self.branch(kit, classes, cond, depth - 1, seed)?;
        let exit_a = (kit.control(), kit.i_o(), kit.reset_memory()?);

        kit.set_control(not_taken);
        kit.set_i_o(io);
        kit.set_all_memory(mem);
        let (obj_b, value_b) = self.branch(kit, classes, cond, 0, seed)?;
        let exit_b = (kit.control(), kit.i_o(), kit.reset_memory()?);

        let c = kit.compile();
        let region = c.make_region(&[exit_a.0, exit_b.0])?;
        let obj = c.make_phi(region, Type::instance(classes.int_vector), &[obj_a, obj_b])?;
        let value = c.make_phi(region, Type::Vect(vt_int4()), &[value_a, value_b])?;
        let io = c.make_phi(region, Type::Io, &[exit_a.1, exit_b.1])?;
        let mem = c.make_phi(region, Type::Memory, &[exit_a.2, exit_b.2])?;
        kit.set_control(region);
        kit.set_i_o(io);
        kit.set_all_memory(mem);
        self.regions.push(region);
        Ok((obj, value))
    }
}

/// A box over nested merges that reach one allocation along two paths.
///
/// ```text
/// shared = allocate                       (before both branches)
/// inner  = Phi(inner_region, shared, other)
/// outer  = Phi(outer_region, inner, shared)
/// ```
pub struct SharedAllocation {
    pub vbox: NodeId,
    pub call: NodeId,
    /// The allocation call that both merges reach
    pub shared: NodeId,
    pub other: NodeId,
    pub shared_value: NodeId,
}

impl SharedAllocation {
    pub fn build(c: &mut Compile, classes: &VectorClasses) -> Result<Self> {
        let (mut kit, parms) = GraphKit::at_method_entry(
            c,
            &[Type::scalar(BasicType::Int), Type::scalar(BasicType::Boolean)],
            frame(classes, 1),
        )?;
        let cond = parms[1];
        let shared_value = replicate(&mut kit, parms[0], vt_int4())?;
        let (shared, shared_obj) = kit.make_vector_box_allocate(classes.int_vector)?;

        let io = kit.i_o();
        let mem = kit.reset_memory()?;
        let ctrl = kit.control();
        let (taken, not_taken) = kit.compile().make_if(ctrl, cond)?;

        kit.set_control(taken);
        let (inner_taken, inner_not_taken) = kit.compile().make_if(taken, cond)?;
        kit.set_control(inner_not_taken);
        let scalar = kit.compile().intcon(7)?;
        let other_value = replicate(&mut kit, scalar, vt_int4())?;
        let (other, other_obj) = kit.make_vector_box_allocate(classes.int_vector)?;
        let other_exit = (kit.control(), kit.i_o(), kit.reset_memory()?);

        let c = kit.compile();
        let inner_region = c.make_region(&[inner_taken, other_exit.0])?;
        let vector_ty = Type::instance(classes.int_vector);
        let inner_obj = c.make_phi(inner_region, vector_ty, &[shared_obj, other_obj])?;
        let inner_value = c.make_phi(
            inner_region,
            Type::Vect(vt_int4()),
            &[shared_value, other_value],
        )?;
        let inner_io = c.make_phi(inner_region, Type::Io, &[io, other_exit.1])?;
        let inner_mem = c.make_phi(inner_region, Type::Memory, &[mem, other_exit.2])?;

        let outer_region = c.make_region(&[inner_region, not_taken])?;
        let obj = c.make_phi(outer_region, vector_ty, &[inner_obj, shared_obj])?;
        let value = c.make_phi(
            outer_region,
            Type::Vect(vt_int4()),
            &[inner_value, shared_value],
        )?;
        let outer_io = c.make_phi(outer_region, Type::Io, &[inner_io, io])?;
        let outer_mem = c.make_phi(outer_region, Type::Memory, &[inner_mem, mem])?;
        kit.set_control(outer_region);
        kit.set_i_o(outer_io);
        kit.set_all_memory(outer_mem);

        let vbox = kit
            .compile()
            .make_vector_box(obj, value, classes.int_vector, vt_int4())?;
        kit.set_local(0, Some(vbox))?;
        let (call, _) = kit.make_call_static_java(
            classes.consume_one,
            &[vbox],
            Type::scalar(BasicType::Int),
        )?;
        kit.return_value(None)?;
        Ok(Self {
            vbox,
            call,
            shared,
            other,
            shared_value,
        })
    }
}

pub struct MergedBoxCall {
    pub vbox: NodeId,
    pub call: NodeId,
    pub region: NodeId,
    pub allocations: [NodeId; 2],
    /// Value of the first path, for building mismatched merges
    pub unmerged_value: NodeId,
}

/// Builds a box over a two-way allocation merge, passed as argument to a call.
pub fn merged_box_call(c: &mut Compile, classes: &VectorClasses) -> Result<MergedBoxCall> {
    let merge = NestedMerge::build(c, classes, 1)?;
    let (&[region], &[first, second]) = (&merge.regions[..], &merge.allocations[..]) else {
        return Err(invariant_error!(
            "expected one region and two allocations, found {} and {}",
            merge.regions.len(),
            merge.allocations.len()
        ));
    };
    Ok(MergedBoxCall {
        vbox: merge.vbox,
        call: merge.call,
        region,
        allocations: [first, second],
        unmerged_value: merge.leaf_value,
    })
}
