//! Graph construction at a program point.
//!
//! [`GraphKit`] carries the state a builder needs to emit code in the middle of a
//! method: the current control, I/O and memory, the frame plumbing, and the debug
//! state (locals, expression stack, monitors and scalar-replaced object fields) that
//! every safepoint and call emitted at this point records.
//!
//! # Architecture
//!
//! ```text
//! GraphKit
//!   control ─────────────► advanced by calls and allocations
//!   i_o                    I/O state
//!   memory                 base state + per-alias slices, merged on demand
//!   frameptr, returnadr    frame plumbing
//!   jvms + map             debug state, rebased so that map[0] is local 0
//! ```
//!
//! A kit is built either at method entry or from an existing safepoint, in which case
//! it continues from the safepoint's inputs and clones its debug state.

use std::collections::BTreeMap;

use crate::{
    compiler::Compile,
    ir::{
        AliasClass, BasicType, ConValue, Graph, JvmState, KlassRef, NodeId, Op, ProjKind, Type,
        TypeVect, CONTROL, FRAME_PTR, I_O, MEMORY, RETURN_ADR,
    },
    meta::{KlassId, MethodId},
    Error, Result,
};

/// Memory state as a base plus the slices written since.
#[derive(Debug, Clone)]
struct MemoryState {
    base: NodeId,
    slices: BTreeMap<AliasClass, NodeId>,
}

impl MemoryState {
    fn new(base: NodeId) -> Self {
        Self {
            base,
            slices: BTreeMap::new(),
        }
    }
}

/// Builder positioned at a program point.
pub struct GraphKit<'c> {
    c: &'c mut Compile,
    control: NodeId,
    i_o: NodeId,
    memory: MemoryState,
    frameptr: NodeId,
    returnadr: NodeId,
    jvms: JvmState,
    map: Vec<Option<NodeId>>,
}

impl<'c> GraphKit<'c> {
    /// Creates a kit at the entry of the compiled method.
    ///
    /// # Arguments
    ///
    /// * `c` - The compilation session
    /// * `parm_types` - Types of the incoming parameters
    /// * `jvms` - Shape of the method's frame; all slots start out empty
    ///
    /// # Returns
    ///
    /// The kit and the parameter nodes.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn at_method_entry(
        c: &'c mut Compile,
        parm_types: &[Type],
        jvms: JvmState,
    ) -> Result<(Self, Vec<NodeId>)> {
        let start = c.new_node(Op::Start, Type::Tuple, vec![None])?;
        let control = c.make_proj(start, ProjKind::Control, Type::Control)?;
        let i_o = c.make_proj(start, ProjKind::Io, Type::Io)?;
        let memory = c.make_proj(start, ProjKind::Memory, Type::Memory)?;
        let frameptr = c.make_proj(start, ProjKind::FramePtr, Type::FramePtr)?;
        let returnadr = c.make_proj(start, ProjKind::ReturnAdr, Type::ReturnAddress)?;
        let mut parms = Vec::with_capacity(parm_types.len());
        for (i, &ty) in parm_types.iter().enumerate() {
            parms.push(c.make_proj(start, ProjKind::Parm(i as u32), ty)?);
        }
        let jvms = jvms.rebased(0);
        let map = vec![None; jvms.debug_end()];
        let kit = Self {
            c,
            control,
            i_o,
            memory: MemoryState::new(memory),
            frameptr,
            returnadr,
            jvms,
            map,
        };
        Ok((kit, parms))
    }

    /// Creates a kit continuing from the inputs of the safepoint or call `sfpt`,
    /// with a copy of its debug state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedNode`] if `sfpt` carries no debug state, or an
    /// invariant error if its plumbing edges are missing.
    pub fn from_safepoint(c: &'c mut Compile, sfpt: NodeId) -> Result<Self> {
        let node = c.graph().node(sfpt)?;
        let Some(jvms) = node.jvms().filter(|_| node.op().is_safepoint()) else {
            return Err(Error::UnexpectedNode {
                node: sfpt,
                expected: "safepoint with debug state",
                actual: node.op().name().to_string(),
            });
        };
        if node.req() < jvms.debug_end() {
            return Err(invariant_error!(
                "{} has {} inputs but debug state ends at {}",
                sfpt,
                node.req(),
                jvms.debug_end()
            ));
        }
        let edge = |index: usize| {
            node.input(index)
                .ok_or_else(|| invariant_error!("{} has no input {}", sfpt, index))
        };
        let control = edge(CONTROL)?;
        let i_o = edge(I_O)?;
        let memory = edge(MEMORY)?;
        let frameptr = edge(FRAME_PTR)?;
        let returnadr = edge(RETURN_ADR)?;
        let map = node.inputs()[jvms.debug_start()..jvms.debug_end()].to_vec();
        let jvms = jvms.rebased(0);
        Ok(Self {
            c,
            control,
            i_o,
            memory: MemoryState::new(memory),
            frameptr,
            returnadr,
            jvms,
            map,
        })
    }

    /// Returns the compilation session.
    pub fn compile(&mut self) -> &mut Compile {
        self.c
    }

    /// Returns the graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        self.c.graph()
    }

    /// Returns the current control.
    #[must_use]
    pub fn control(&self) -> NodeId {
        self.control
    }

    /// Sets the current control.
    pub fn set_control(&mut self, ctrl: NodeId) {
        self.control = ctrl;
    }

    /// Returns the current I/O state.
    #[must_use]
    pub fn i_o(&self) -> NodeId {
        self.i_o
    }

    /// Sets the current I/O state.
    pub fn set_i_o(&mut self, io: NodeId) {
        self.i_o = io;
    }

    /// Returns the frame pointer.
    #[must_use]
    pub fn frameptr(&self) -> NodeId {
        self.frameptr
    }

    /// Returns the return address.
    #[must_use]
    pub fn returnadr(&self) -> NodeId {
        self.returnadr
    }

    /// Returns the debug state, with `locoff == 0`.
    #[must_use]
    pub fn jvms(&self) -> &JvmState {
        &self.jvms
    }

    /// Returns the debug slots, indexed like [`GraphKit::jvms`].
    #[must_use]
    pub fn map(&self) -> &[Option<NodeId>] {
        &self.map
    }

    /// Returns the number of live expression stack slots.
    #[must_use]
    pub fn sp(&self) -> usize {
        self.jvms.sp()
    }

    /// Returns local `index`.
    #[must_use]
    pub fn local(&self, index: usize) -> Option<NodeId> {
        if index >= self.jvms.loc_size() {
            return None;
        }
        self.map[self.jvms.locoff() + index]
    }

    /// Sets local `index`.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if the frame has no such local.
    pub fn set_local(&mut self, index: usize, value: Option<NodeId>) -> Result<()> {
        if index >= self.jvms.loc_size() {
            return Err(invariant_error!(
                "local {} out of range, frame has {}",
                index,
                self.jvms.loc_size()
            ));
        }
        self.map[self.jvms.locoff() + index] = value;
        Ok(())
    }

    /// Returns expression stack slot `index`, counted from the bottom.
    #[must_use]
    pub fn stack(&self, index: usize) -> Option<NodeId> {
        if index >= self.jvms.sp() {
            return None;
        }
        self.map[self.jvms.stkoff() + index]
    }

    /// Grows the expression stack so that it can hold `size` slots.
    pub fn ensure_stack(&mut self, size: usize) {
        let monoff = self.jvms.monoff();
        let grow = self.jvms.grow_stack(size);
        if grow > 0 {
            self.map
                .splice(monoff..monoff, std::iter::repeat(None).take(grow));
        }
    }

    /// Pushes `value` onto the expression stack, growing it if needed.
    pub fn push(&mut self, value: NodeId) {
        let sp = self.jvms.sp();
        self.ensure_stack(sp + 1);
        self.map[self.jvms.stkoff() + sp] = Some(value);
        self.jvms.set_sp(sp + 1);
    }

    /// Pops `count` slots off the expression stack.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if fewer than `count` slots are live.
    pub fn dec_sp(&mut self, count: usize) -> Result<()> {
        let sp = self.jvms.sp();
        if count > sp {
            return Err(invariant_error!(
                "cannot pop {} slots with only {} live",
                count,
                sp
            ));
        }
        self.jvms.set_sp(sp - count);
        Ok(())
    }

    /// Replaces every debug slot holding `old` with `new`.
    ///
    /// # Returns
    ///
    /// The number of replaced slots.
    pub fn replace_in_map(&mut self, old: NodeId, new: NodeId) -> usize {
        let mut replaced = 0;
        for slot in &mut self.map {
            if *slot == Some(old) {
                *slot = Some(new);
                replaced += 1;
            }
        }
        replaced
    }

    /// Runs `f` with the debug state marked for re-execution of the current bytecode,
    /// restoring the previous marking afterwards.
    ///
    /// # Errors
    ///
    /// Propagates the errors of `f`.
    pub fn with_reexecute<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let prior = self.jvms.should_reexecute();
        self.jvms.set_should_reexecute(true);
        let result = f(self);
        self.jvms.set_should_reexecute(prior);
        result
    }

    /// Runs `f` with `args` pushed on the expression stack, popping them afterwards.
    ///
    /// Code emitted by `f` records the arguments as live stack slots, so a
    /// deoptimization inside it can re-execute the call that consumes them.
    ///
    /// # Errors
    ///
    /// Propagates the errors of `f`.
    pub fn with_staged_arguments<R>(
        &mut self,
        args: &[NodeId],
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.ensure_stack(self.jvms.sp() + args.len());
        for &arg in args {
            self.push(arg);
        }
        let result = f(self);
        self.dec_sp(args.len())?;
        result
    }

    /// Returns the memory state of `alias`; `Bottom` yields the merged state of all
    /// slices.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn memory(&mut self, alias: AliasClass) -> Result<NodeId> {
        if alias == AliasClass::Bottom {
            return self.merged_memory();
        }
        Ok(self
            .memory
            .slices
            .get(&alias)
            .copied()
            .unwrap_or(self.memory.base))
    }

    /// Sets the memory state of `alias`; `Bottom` replaces the whole state.
    pub fn set_memory(&mut self, mem: NodeId, alias: AliasClass) {
        if alias == AliasClass::Bottom {
            self.set_all_memory(mem);
        } else {
            self.memory.slices.insert(alias, mem);
        }
    }

    /// Replaces the whole memory state with `mem`.
    pub fn set_all_memory(&mut self, mem: NodeId) {
        self.memory = MemoryState::new(mem);
    }

    fn merged_memory(&mut self) -> Result<NodeId> {
        if self.memory.slices.is_empty() {
            return Ok(self.memory.base);
        }
        let slices: Vec<AliasClass> = self.memory.slices.keys().copied().collect();
        let mut inputs = vec![None, Some(self.memory.base)];
        inputs.extend(self.memory.slices.values().copied().map(Some));
        let merge = self
            .c
            .new_node(Op::MergeMem { slices }, Type::Memory, inputs)?;
        self.c.transform(merge)
    }

    /// Collapses the memory state into a single node and returns it.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn reset_memory(&mut self) -> Result<NodeId> {
        let merged = self.merged_memory()?;
        self.set_all_memory(merged);
        Ok(merged)
    }

    /// Returns the debug edges of the current state laid out from input `locoff` on,
    /// together with the matching debug state.
    ///
    /// Only the live part of the expression stack is recorded.
    fn debug_edges(&self, locoff: usize) -> (Vec<Option<NodeId>>, JvmState) {
        let j = &self.jvms;
        let mut edges = Vec::with_capacity(j.debug_end());
        edges.extend_from_slice(&self.map[j.locoff()..j.stkoff()]);
        edges.extend_from_slice(&self.map[j.stkoff()..j.stkoff() + j.sp()]);
        edges.extend_from_slice(&self.map[j.monoff()..j.debug_end()]);

        let mut out = JvmState::new(
            j.method(),
            j.bci(),
            locoff,
            j.loc_size(),
            j.sp(),
            j.mon_size(),
        );
        out.set_endoff(out.scloff() + j.scl_size());
        out.set_should_reexecute(j.should_reexecute());
        (edges, out)
    }

    fn plumbing(&mut self) -> Result<Vec<Option<NodeId>>> {
        let mem = self.reset_memory()?;
        Ok(vec![
            Some(self.control),
            Some(self.i_o),
            Some(mem),
            Some(self.frameptr),
            Some(self.returnadr),
        ])
    }

    /// Creates a Java call `op` with `args` at the current point.
    ///
    /// The call records the current debug state and becomes the new control; its I/O,
    /// memory and result are picked up with [`GraphKit::set_results_for_java_call`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedNode`] if `op` is not a Java call.
    pub fn set_edges_for_java_call(&mut self, op: Op, args: &[NodeId]) -> Result<NodeId> {
        if !op.is_call_java() {
            return Err(Error::UnexpectedNode {
                node: self.control,
                expected: "Java call",
                actual: op.name().to_string(),
            });
        }
        let mut inputs = self.plumbing()?;
        inputs.extend(args.iter().copied().map(Some));
        let (debug, jvms) = self.debug_edges(inputs.len());
        inputs.extend(debug);
        let call = self.c.new_node(op, Type::Tuple, inputs)?;
        self.c.graph_mut().set_jvms(call, jvms)?;
        self.control = self.c.make_proj(call, ProjKind::Control, Type::Control)?;
        Ok(call)
    }

    /// Picks up the I/O and memory state after `call` and returns its result.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn set_results_for_java_call(&mut self, call: NodeId, result_ty: Type) -> Result<NodeId> {
        let io = self.c.make_proj(call, ProjKind::Io, Type::Io)?;
        let mem = self.c.make_proj(call, ProjKind::Memory, Type::Memory)?;
        self.set_i_o(io);
        self.set_all_memory(mem);
        self.c.make_proj(call, ProjKind::Result, result_ty)
    }

    /// Routes the exceptional exit of `call` to a deoptimizing trap.
    ///
    /// # Returns
    ///
    /// The trap node.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn make_slow_call_ex(&mut self, call: NodeId) -> Result<NodeId> {
        let catch = self.c.make_proj(call, ProjKind::CatchAll, Type::Control)?;
        let io = self.c.make_proj(call, ProjKind::Io, Type::Io)?;
        let mem = self.c.make_proj(call, ProjKind::Memory, Type::Memory)?;
        let trap = self.c.new_node(
            Op::UncommonTrap,
            Type::Control,
            vec![
                Some(catch),
                Some(io),
                Some(mem),
                Some(self.frameptr),
                Some(self.returnadr),
            ],
        )?;
        let root = self.c.graph().root();
        self.c.graph_mut().add_input(root, Some(trap))?;
        Ok(trap)
    }

    /// Emits a pending box allocation of `box_klass` at the current point.
    ///
    /// # Returns
    ///
    /// The allocation call and its result object.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn make_vector_box_allocate(&mut self, box_klass: KlassId) -> Result<(NodeId, NodeId)> {
        let alloc = self.set_edges_for_java_call(Op::VectorBoxAllocate { box_klass }, &[])?;
        self.make_slow_call_ex(alloc)?;
        let result = self.set_results_for_java_call(alloc, Type::instance(box_klass))?;
        Ok((alloc, result))
    }

    /// Boxes the raw vector `value` into a fresh pending allocation of `box_klass`.
    ///
    /// # Returns
    ///
    /// The box node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if `value` is not of shape `vt`.
    pub fn box_vector(
        &mut self,
        value: NodeId,
        box_klass: KlassId,
        vt: TypeVect,
    ) -> Result<NodeId> {
        let (_, obj) = self.make_vector_box_allocate(box_klass)?;
        self.c.make_vector_box(obj, value, box_klass, vt)
    }

    /// Emits a static Java call of `method` with `args`.
    ///
    /// # Returns
    ///
    /// The call and its result.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn make_call_static_java(
        &mut self,
        method: MethodId,
        args: &[NodeId],
        result_ty: Type,
    ) -> Result<(NodeId, NodeId)> {
        let call = self.set_edges_for_java_call(Op::CallStaticJava { method }, args)?;
        let result = self.set_results_for_java_call(call, result_ty)?;
        Ok((call, result))
    }

    /// Emits a safepoint poll recording the current debug state.
    ///
    /// The safepoint becomes the new control.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn make_safepoint(&mut self) -> Result<NodeId> {
        let mut inputs = self.plumbing()?;
        let (debug, jvms) = self.debug_edges(inputs.len());
        inputs.extend(debug);
        let sfpt = self.c.new_node(Op::SafePoint, Type::Control, inputs)?;
        self.c.graph_mut().set_jvms(sfpt, jvms)?;
        self.control = sfpt;
        Ok(sfpt)
    }

    /// Emits a method return of `value`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn return_value(&mut self, value: Option<NodeId>) -> Result<NodeId> {
        let mut inputs = self.plumbing()?;
        inputs.push(value);
        let ret = self.c.new_node(Op::Return, Type::Control, inputs)?;
        let root = self.c.graph().root();
        self.c.graph_mut().add_input(root, Some(ret))?;
        Ok(ret)
    }

    /// Replaces `call` by the kit's current state.
    ///
    /// Users of the call's control, I/O and memory projections continue from the kit's
    /// control, I/O and memory; users of the result see `result`. The exceptional
    /// exit becomes dead. The call and its projections are removed.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if the call's result is used but no `result` is
    /// given.
    pub fn replace_call(&mut self, call: NodeId, result: Option<NodeId>) -> Result<()> {
        let final_mem = self.reset_memory()?;
        let top = self.c.graph().top();
        for (kind, proj) in self.c.graph().projections(call) {
            let with = match kind {
                ProjKind::Control => self.control,
                ProjKind::Io => self.i_o,
                ProjKind::Memory => final_mem,
                ProjKind::Result => match result {
                    Some(result) => result,
                    None if self.c.graph().outcnt(proj) == 0 => top,
                    None => {
                        return Err(invariant_error!(
                            "result of {} is still used by {}",
                            call,
                            self.c.graph().outs(proj)[0]
                        ))
                    }
                },
                _ => top,
            };
            self.c.gvn_replace_by(proj, with)?;
            self.c.remove_node(proj)?;
        }
        if self.c.graph().outcnt(call) > 0 {
            return Err(invariant_error!(
                "{} still has non-projection uses after replacement",
                call
            ));
        }
        self.c.remove_node(call)
    }

    /// Allocates an array of `length` elements of `elem` at the current point.
    ///
    /// # Returns
    ///
    /// The initialized array object.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn new_array(&mut self, elem: BasicType, length: u32) -> Result<NodeId> {
        let klass = self.c.makecon(ConValue::Klass(KlassRef::Array(elem)))?;
        let length = self.c.intcon(length as i32)?;
        self.allocate(Op::AllocateArray, &[klass, length], Type::array(elem))
    }

    /// Allocates an instance of `klass` at the current point.
    ///
    /// # Returns
    ///
    /// The initialized object.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn new_instance(&mut self, klass: KlassId) -> Result<NodeId> {
        let klass_con = self.c.makecon(ConValue::Klass(KlassRef::Instance(klass)))?;
        self.allocate(Op::Allocate, &[klass_con], Type::instance(klass))
    }

    fn allocate(&mut self, op: Op, extra: &[NodeId], oop_ty: Type) -> Result<NodeId> {
        let mut inputs = self.plumbing()?;
        inputs.extend(extra.iter().copied().map(Some));
        let alloc = self.c.new_node(op, Type::Tuple, inputs)?;

        self.control = self.c.make_proj(alloc, ProjKind::Control, Type::Control)?;
        self.i_o = self.c.make_proj(alloc, ProjKind::Io, Type::Io)?;
        let raw_mem = self.c.make_proj(alloc, ProjKind::Memory, Type::Memory)?;
        self.set_memory(raw_mem, AliasClass::Raw);
        let raw_oop = self
            .c
            .make_proj(alloc, ProjKind::Result, Type::Address(AliasClass::Raw))?;
        self.c.new_node(
            Op::CheckCastPP,
            oop_ty,
            vec![Some(self.control), Some(raw_oop)],
        )
    }

    /// Stores `value` at `adr` in memory slice `alias`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn store(&mut self, adr: NodeId, value: NodeId, alias: AliasClass) -> Result<NodeId> {
        self.emit_store(Op::Store { alias }, adr, value, alias)
    }

    /// Stores the whole vector `value` at `adr` in memory slice `alias`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn store_vector(
        &mut self,
        adr: NodeId,
        value: NodeId,
        alias: AliasClass,
    ) -> Result<NodeId> {
        self.emit_store(Op::StoreVector { alias }, adr, value, alias)
    }

    fn emit_store(
        &mut self,
        op: Op,
        adr: NodeId,
        value: NodeId,
        alias: AliasClass,
    ) -> Result<NodeId> {
        let mem = self.memory(alias)?;
        let st = self.c.new_node(
            op,
            Type::Memory,
            vec![Some(self.control), Some(mem), Some(adr), Some(value)],
        )?;
        self.set_memory(st, alias);
        Ok(st)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BasicType, PARMS},
        test::int128_session,
    };

    fn frame(method: MethodId) -> JvmState {
        JvmState::new(method, 4, 0, 2, 1, 0)
    }

    #[test]
    fn test_stack_growth_shifts_monitors() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let jvms = JvmState::new(classes.method, 0, 0, 1, 0, 1);
        let (mut kit, parms) =
            GraphKit::at_method_entry(&mut c, &[Type::scalar(BasicType::Int)], jvms)?;
        let monitor_slot = kit.jvms().monoff();
        kit.map[monitor_slot] = Some(parms[0]);

        kit.push(parms[0]);
        kit.push(parms[0]);
        assert_eq!(kit.sp(), 2);
        assert_eq!(kit.jvms().stack_capacity(), 2);
        assert_eq!(kit.map()[kit.jvms().monoff()], Some(parms[0]));
        assert_eq!(kit.map().len(), kit.jvms().debug_end());

        kit.dec_sp(2)?;
        assert_eq!(kit.sp(), 0);
        assert!(kit.dec_sp(1).is_err());
        Ok(())
    }

    #[test]
    fn test_staged_arguments_popped_on_error() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let (mut kit, parms) = GraphKit::at_method_entry(
            &mut c,
            &[Type::scalar(BasicType::Int)],
            frame(classes.method),
        )?;
        let sp = kit.sp();

        let staged = kit.with_staged_arguments(&[parms[0], parms[0]], |kit| {
            assert_eq!(kit.sp(), sp + 2);
            kit.with_reexecute(|_| -> Result<()> { Err(Error::RecursionLimit(1)) })
        });
        assert!(matches!(staged, Err(Error::RecursionLimit(1))));
        assert_eq!(kit.sp(), sp);
        assert!(!kit.jvms().should_reexecute());
        Ok(())
    }

    #[test]
    fn test_call_records_debug_state() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let (mut kit, parms) = GraphKit::at_method_entry(
            &mut c,
            &[Type::scalar(BasicType::Int)],
            frame(classes.method),
        )?;
        kit.set_local(1, Some(parms[0]))?;
        kit.push(parms[0]);

        let (call, _) = kit.make_call_static_java(
            classes.consume_one,
            &[parms[0]],
            Type::scalar(BasicType::Int),
        )?;
        let graph = kit.graph();
        let node = graph.node(call)?;
        let jvms = node.jvms().ok_or(Error::InvalidNode(call))?;
        assert_eq!(jvms.debug_start(), PARMS + 1);
        assert_eq!(jvms.loc_size(), 2);
        assert_eq!(jvms.sp(), 2);
        assert_eq!(node.input(jvms.locoff() + 1), Some(parms[0]));
        assert_eq!(node.call_args(), &[Some(parms[0])]);
        assert!(node.has_non_debug_use(parms[0]));
        assert_eq!(graph.input(kit.control(), 0), Some(call));
        Ok(())
    }

    #[test]
    fn test_from_safepoint_clones_state() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let sfpt = {
            let (mut kit, parms) = GraphKit::at_method_entry(
                &mut c,
                &[Type::scalar(BasicType::Int)],
                frame(classes.method),
            )?;
            kit.set_local(0, Some(parms[0]))?;
            kit.make_safepoint()?
        };
        let kit = GraphKit::from_safepoint(&mut c, sfpt)?;
        assert_eq!(kit.jvms().locoff(), 0);
        assert!(kit.local(0).is_some());
        assert_eq!(kit.map().len(), kit.jvms().debug_end());

        let con = c.intcon(0)?;
        assert!(matches!(
            GraphKit::from_safepoint(&mut c, con),
            Err(Error::UnexpectedNode { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_memory_slices_merge() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let jvms = JvmState::new(MethodId::new(0), 0, 0, 0, 0, 0);
        let (mut kit, _) = GraphKit::at_method_entry(&mut c, &[], jvms)?;
        let base = kit.memory(AliasClass::Raw)?;
        let arr = kit.new_array(BasicType::Int, 4)?;
        assert_ne!(kit.memory(AliasClass::Raw)?, base);
        let merged = kit.reset_memory()?;
        assert!(matches!(kit.graph().op(merged), Some(Op::MergeMem { .. })));
        assert_eq!(kit.graph().ty(arr), Type::array(BasicType::Int));
        Ok(())
    }

    #[test]
    fn test_replace_call_rewires_projections() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let (mut kit, parms) = GraphKit::at_method_entry(
            &mut c,
            &[Type::scalar(BasicType::Int)],
            frame(classes.method),
        )?;
        let before = kit.control();
        let (call, result) = kit.make_call_static_java(
            classes.consume_one,
            &[parms[0]],
            Type::scalar(BasicType::Int),
        )?;
        let ret = kit.return_value(Some(result))?;

        let mut kit = GraphKit::from_safepoint(&mut c, call)?;
        kit.replace_call(call, Some(parms[0]))?;
        assert!(!c.graph().is_live(call));
        assert_eq!(c.graph().input(ret, CONTROL), Some(before));
        assert_eq!(c.graph().input(ret, PARMS), Some(parms[0]));
        Ok(())
    }
}
