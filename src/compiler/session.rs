//! Compilation session state shared by all stages of the phase.

use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use crate::{
    compiler::{
        gvn::{self, ValueKey},
        EventKind, EventLog, VectorConfig,
    },
    ir::{
        AliasClass, BasicType, ConValue, Graph, NodeId, Op, OopType, ProjKind, Type, TypeVect,
        UniqueNodeList, VectorOp,
    },
    meta::{ClassOracle, FieldInfo, KlassId, VectorFamily},
    Error, Result,
};

/// State of one method compilation.
///
/// `Compile` owns the graph and everything the vector-box phase reads or writes
/// besides it: the macro node list, the set of nodes recorded for the next
/// value-numbering pass, the widest vector seen, the failing flag and the incremental
/// inlining flag. A session is used by one thread at a time; independent sessions can
/// be processed in parallel, see [`crate::compiler::BatchScheduler`].
///
/// # Failing State
///
/// Resource exhaustion never surfaces as an `Err`. Node creation past the configured
/// budget records a failure instead, and every stage polls [`Compile::failing`] after
/// each node and stops mutating the graph once it is set.
pub struct Compile {
    graph: Graph,
    oracle: Arc<dyn ClassOracle>,
    config: VectorConfig,
    failure: Option<String>,
    inlining_incrementally: bool,
    macro_nodes: UniqueNodeList,
    for_igvn: UniqueNodeList,
    reboxing_calls: Vec<NodeId>,
    max_vector_size: u32,
    pub(crate) value_table: HashMap<ValueKey, NodeId>,
    /// Log of every transformation applied to the graph
    pub events: EventLog,
}

impl Compile {
    /// Creates a session with an empty graph.
    ///
    /// # Arguments
    ///
    /// * `oracle` - Class metadata of the compiled program
    /// * `config` - Phase configuration
    #[must_use]
    pub fn new(oracle: Arc<dyn ClassOracle>, config: VectorConfig) -> Self {
        Self {
            graph: Graph::new(),
            oracle,
            config,
            failure: None,
            inlining_incrementally: false,
            macro_nodes: UniqueNodeList::new(),
            for_igvn: UniqueNodeList::new(),
            reboxing_calls: Vec::new(),
            max_vector_size: 0,
            value_table: HashMap::new(),
            events: EventLog::new(),
        }
    }

    /// Returns the graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the graph for modification.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Returns the class metadata oracle.
    #[must_use]
    pub fn oracle(&self) -> &dyn ClassOracle {
        self.oracle.as_ref()
    }

    /// Returns the phase configuration.
    #[must_use]
    pub fn config(&self) -> &VectorConfig {
        &self.config
    }

    /// Returns `true` once the compilation has failed.
    #[must_use]
    pub fn failing(&self) -> bool {
        self.failure.is_some()
    }

    /// Returns the reason of the first recorded failure.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Puts the compilation into the failing state.
    ///
    /// Only the first reason is kept.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        if self.failure.is_none() {
            let reason = reason.into();
            self.events.record(EventKind::Bailout).message(reason.clone());
            self.failure = Some(reason);
        }
    }

    /// Returns `true` while a phase performs incremental inlining.
    #[must_use]
    pub fn inlining_incrementally(&self) -> bool {
        self.inlining_incrementally
    }

    /// Sets the incremental inlining flag directly.
    ///
    /// Drivers that inline outside of [`Compile::incremental_inlining`] use this to
    /// publish their state.
    pub fn set_inlining_incrementally(&mut self, on: bool) {
        self.inlining_incrementally = on;
    }

    /// Enters an incremental inlining scope.
    ///
    /// The returned guard dereferences to the session and restores the previous flag
    /// value when dropped, on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InliningConflict`] if incremental inlining is already active.
    pub fn incremental_inlining(&mut self) -> Result<InliningScope<'_>> {
        if self.inlining_incrementally {
            return Err(Error::InliningConflict);
        }
        let prior = self.inlining_incrementally;
        self.inlining_incrementally = true;
        Ok(InliningScope {
            compile: self,
            prior,
        })
    }

    /// Returns the number of pending macro nodes.
    #[must_use]
    pub fn macro_count(&self) -> usize {
        self.macro_nodes.len()
    }

    /// Returns the macro node at `index`.
    #[must_use]
    pub fn macro_node(&self, index: usize) -> Option<NodeId> {
        self.macro_nodes.at(index)
    }

    /// Iterates the pending macro nodes in creation order.
    pub fn macro_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.macro_nodes.iter()
    }

    /// Removes `id` from the macro list.
    ///
    /// # Returns
    ///
    /// `true` if the node was pending.
    pub fn remove_macro_node(&mut self, id: NodeId) -> bool {
        self.macro_nodes.remove(id)
    }

    /// Records `id` for the next value-numbering pass.
    pub fn record_for_igvn(&mut self, id: NodeId) {
        self.for_igvn.push(id);
    }

    /// Returns the nodes recorded for the next value-numbering pass.
    #[must_use]
    pub fn for_igvn(&self) -> &UniqueNodeList {
        &self.for_igvn
    }

    /// Forgets every node recorded for value numbering.
    pub fn clear_for_igvn(&mut self) {
        self.for_igvn.clear();
    }

    pub(crate) fn take_for_igvn(&mut self) -> UniqueNodeList {
        std::mem::take(&mut self.for_igvn)
    }

    /// Returns the width in bytes of the widest vector memory operation emitted.
    #[must_use]
    pub fn max_vector_size(&self) -> u32 {
        self.max_vector_size
    }

    /// Raises the widest vector width to at least `bytes`.
    pub fn raise_max_vector_size(&mut self, bytes: u32) {
        self.max_vector_size = self.max_vector_size.max(bytes);
    }

    /// Registers a call to be inlined by the reboxing-call stage.
    pub fn add_vector_reboxing_late_inline(&mut self, call: NodeId) {
        if !self.reboxing_calls.contains(&call) {
            self.reboxing_calls.push(call);
        }
    }

    /// Returns the calls awaiting reboxing inlining.
    #[must_use]
    pub fn vector_reboxing_late_inlines(&self) -> &[NodeId] {
        &self.reboxing_calls
    }

    /// Removes and returns the calls awaiting reboxing inlining.
    pub fn take_vector_reboxing_late_inlines(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.reboxing_calls)
    }

    /// Creates a node, tracking it in the macro list if its operation requires.
    ///
    /// Exceeding the node budget does not fail the call; it records a compilation
    /// failure that stages observe through [`Compile::failing`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if an input is not a live node.
    pub fn new_node(&mut self, op: Op, ty: Type, inputs: Vec<Option<NodeId>>) -> Result<NodeId> {
        let is_macro = op.is_macro();
        let id = self.graph.add_node(op, ty, inputs)?;
        if is_macro {
            self.macro_nodes.push(id);
        }
        if self.graph.live_count() > self.config.max_nodes {
            self.record_failure("out of nodes during vector box elimination");
        }
        Ok(id)
    }

    /// Applies identities and value numbering to a freshly created node.
    ///
    /// # Returns
    ///
    /// The node to use in place of `id`; `id` itself is discarded if another node
    /// replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not live.
    pub fn transform(&mut self, id: NodeId) -> Result<NodeId> {
        gvn::transform(self, id)
    }

    /// Redirects every use of `old` to `new` and records the users for value numbering.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if either node is not live.
    pub fn gvn_replace_by(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let users = self.graph.replace_all_uses(old, new)?;
        for user in users {
            self.record_for_igvn(user);
        }
        Ok(())
    }

    /// Removes a node without uses, together with its macro and value-numbering entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the node still has uses.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.graph.remove_node(id)?;
        self.macro_nodes.remove(id);
        self.for_igvn.remove(id);
        Ok(())
    }

    /// Drops list entries that refer to removed nodes.
    pub(crate) fn prune_dead_entries(&mut self) {
        let graph = &self.graph;
        self.macro_nodes.retain(|n| graph.is_live(n));
        self.for_igvn.retain(|n| graph.is_live(n));
        self.reboxing_calls.retain(|&n| graph.is_live(n));
        self.value_table.retain(|_, n| graph.is_live(*n));
    }

    /// Renames every id held by the session after graph compaction.
    pub(crate) fn apply_remap(&mut self, remap: &[Option<NodeId>]) {
        self.macro_nodes.remap(remap);
        self.for_igvn.remap(remap);
        self.reboxing_calls = self
            .reboxing_calls
            .iter()
            .filter_map(|n| remap.get(n.index()).copied().flatten())
            .collect();
        self.value_table.clear();
    }

    /// Returns the shared constant node for `value`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn makecon(&mut self, value: ConValue) -> Result<NodeId> {
        let root = self.graph.root();
        let con = self.new_node(Op::Con(value), value.ty(), vec![Some(root)])?;
        self.transform(con)
    }

    /// Returns the shared `int` constant node for `value`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn intcon(&mut self, value: i32) -> Result<NodeId> {
        self.makecon(ConValue::Int(value))
    }

    /// Returns the shared `long` constant node for `value`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn longcon(&mut self, value: i64) -> Result<NodeId> {
        self.makecon(ConValue::Long(value))
    }

    /// Returns the projection of `owner` selecting `kind`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn make_proj(&mut self, owner: NodeId, kind: ProjKind, ty: Type) -> Result<NodeId> {
        let proj = self.new_node(Op::Proj(kind), ty, vec![Some(owner)])?;
        self.transform(proj)
    }

    /// Creates a control merge of `preds`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn make_region(&mut self, preds: &[NodeId]) -> Result<NodeId> {
        let mut inputs = vec![None];
        inputs.extend(preds.iter().copied().map(Some));
        self.new_node(Op::Region, Type::Control, inputs)
    }

    /// Creates a value merge of `values` over `region`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MergeMismatch`] if the number of values differs from the
    /// region's incoming paths.
    pub fn make_phi(&mut self, region: NodeId, ty: Type, values: &[NodeId]) -> Result<NodeId> {
        let paths = self.graph.node(region)?.req() - 1;
        if paths != values.len() {
            return Err(Error::MergeMismatch {
                node: region,
                message: format!("region has {paths} paths, phi has {} values", values.len()),
            });
        }
        let mut inputs = vec![Some(region)];
        inputs.extend(values.iter().copied().map(Some));
        self.new_node(Op::Phi, ty, inputs)
    }

    /// Creates a two-way branch on `cond` and returns its (taken, fall-through)
    /// projections.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn make_if(&mut self, ctrl: NodeId, cond: NodeId) -> Result<(NodeId, NodeId)> {
        let iff = self.new_node(Op::If, Type::Tuple, vec![Some(ctrl), Some(cond)])?;
        let taken = self.make_proj(iff, ProjKind::IfTrue, Type::Control)?;
        let not_taken = self.make_proj(iff, ProjKind::IfFalse, Type::Control)?;
        Ok((taken, not_taken))
    }

    /// Creates a catalog node over `operands`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn make_vector(&mut self, op: VectorOp, ty: Type, operands: &[NodeId]) -> Result<NodeId> {
        let mut inputs = vec![None];
        inputs.extend(operands.iter().copied().map(Some));
        let node = self.new_node(Op::Vector(op), ty, inputs)?;
        self.transform(node)
    }

    /// Returns the boxed-vector family of the object produced by `obj`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `obj` is not a pointer to a boxed-vector
    /// class.
    pub fn vector_family_of(&self, obj: NodeId) -> Result<(KlassId, VectorFamily)> {
        let ty = self.graph.ty(obj);
        let family = match ty.as_oop() {
            Some(OopType::Instance { klass, .. }) => {
                self.oracle.vector_family(klass).map(|f| (klass, f))
            }
            _ => None,
        };
        family.ok_or_else(|| Error::TypeMismatch {
            node: obj,
            expected: "boxed vector, mask or shuffle".to_string(),
            actual: ty.to_string(),
        })
    }

    /// Creates a box viewing the raw vector `value` as an object of `box_klass`.
    ///
    /// # Arguments
    ///
    /// * `allocation` - The object allocation backing the box (result of a box
    ///   allocation call, or a merge of such results)
    /// * `value` - The raw vector value
    /// * `box_klass` - Class of the box
    /// * `vt` - Declared vector shape
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if `value` is not of shape `vt`, and
    /// [`Error::TypeMismatch`] if `value` is not a vector or `box_klass` is not a
    /// boxed-vector class.
    pub fn make_vector_box(
        &mut self,
        allocation: NodeId,
        value: NodeId,
        box_klass: KlassId,
        vt: TypeVect,
    ) -> Result<NodeId> {
        let value_ty = self.graph.node(value)?.ty();
        match value_ty.is_vect() {
            Some(actual) if actual == vt => {}
            Some(actual) => {
                return Err(Error::ShapeMismatch {
                    node: value,
                    expected: vt,
                    actual,
                })
            }
            None => {
                return Err(Error::TypeMismatch {
                    node: value,
                    expected: format!("vector[{vt}]"),
                    actual: value_ty.to_string(),
                })
            }
        }
        if self.oracle.vector_family(box_klass).is_none() {
            return Err(Error::TypeMismatch {
                node: allocation,
                expected: "boxed vector, mask or shuffle".to_string(),
                actual: self
                    .oracle
                    .class_name(box_klass)
                    .unwrap_or_else(|| box_klass.to_string()),
            });
        }
        let vbox = self.new_node(
            Op::VectorBox { vt },
            Type::instance(box_klass),
            vec![None, Some(allocation), Some(value)],
        )?;
        self.transform(vbox)
    }

    /// Creates an unbox reading a raw vector of shape `vt` out of the box `obj`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `obj` is not a boxed vector, mask or
    /// shuffle.
    pub fn make_vector_unbox(
        &mut self,
        ctrl: Option<NodeId>,
        mem: NodeId,
        obj: NodeId,
        vt: TypeVect,
        shuffle_to_vector: bool,
    ) -> Result<NodeId> {
        self.vector_family_of(obj)?;
        let unbox = self.new_node(
            Op::VectorUnbox { shuffle_to_vector },
            Type::Vect(vt),
            vec![ctrl, Some(mem), Some(obj)],
        )?;
        self.transform(unbox)
    }

    /// Returns the address of element `index` of the array `arr` of `bt`.
    ///
    /// The address carries the precise array element alias class only if the static
    /// type of `arr` is a `bt` array; otherwise it aliases all memory.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn array_element_address(
        &mut self,
        arr: NodeId,
        index: u32,
        bt: BasicType,
    ) -> Result<NodeId> {
        let alias = match self.graph.ty(arr).as_oop() {
            Some(OopType::Array { elem, .. }) if elem == bt => AliasClass::ArrayElement(bt),
            _ => AliasClass::Bottom,
        };
        let offset = self.longcon(i64::from(bt.array_element_offset(index)))?;
        let adr = self.new_node(
            Op::AddP,
            Type::Address(alias),
            vec![None, Some(arr), Some(arr), Some(offset)],
        )?;
        self.transform(adr)
    }

    /// Returns the address of `field` inside `obj`.
    ///
    /// # Errors
    ///
    /// Propagates node creation errors.
    pub fn field_address(&mut self, obj: NodeId, field: &FieldInfo) -> Result<NodeId> {
        let alias = AliasClass::Field {
            holder: field.holder,
            offset: field.offset_in_bytes,
        };
        let offset = self.longcon(i64::from(field.offset_in_bytes))?;
        let adr = self.new_node(
            Op::AddP,
            Type::Address(alias),
            vec![None, Some(obj), Some(obj), Some(offset)],
        )?;
        self.transform(adr)
    }
}

/// Guard of an incremental inlining scope.
///
/// Dereferences to the [`Compile`] session and restores the inlining flag when dropped.
pub struct InliningScope<'a> {
    compile: &'a mut Compile,
    prior: bool,
}

impl Deref for InliningScope<'_> {
    type Target = Compile;

    fn deref(&self) -> &Compile {
        self.compile
    }
}

impl DerefMut for InliningScope<'_> {
    fn deref_mut(&mut self) -> &mut Compile {
        self.compile
    }
}

impl Drop for InliningScope<'_> {
    fn drop(&mut self) {
        self.compile.inlining_incrementally = self.prior;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{int128_session, vt_int4};

    #[test]
    fn test_inlining_scope_restores_flag() -> Result<()> {
        let (mut c, _) = int128_session()?;
        {
            let scope = c.incremental_inlining()?;
            assert!(scope.inlining_incrementally());
        }
        assert!(!c.inlining_incrementally());

        c.set_inlining_incrementally(true);
        assert!(matches!(
            c.incremental_inlining(),
            Err(Error::InliningConflict)
        ));
        Ok(())
    }

    #[test]
    fn test_inlining_scope_restores_on_error() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let result: Result<()> = (|| {
            let _scope = c.incremental_inlining()?;
            Err(Error::Error("stage failed".into()))
        })();
        assert!(result.is_err());
        assert!(!c.inlining_incrementally());
        Ok(())
    }

    #[test]
    fn test_node_budget_sets_failing() -> Result<()> {
        let (mut c, _) = int128_session()?;
        c.config.max_nodes = c.graph().live_count() + 1;
        c.intcon(1)?;
        assert!(!c.failing());
        c.intcon(2)?;
        assert!(c.failing());
        assert!(c.failure_reason().is_some_and(|r| r.contains("out of nodes")));
        assert_eq!(c.events.count(EventKind::Bailout), 1);

        c.record_failure("second");
        assert!(c.failure_reason().is_some_and(|r| r.contains("out of nodes")));
        Ok(())
    }

    #[test]
    fn test_constants_are_shared() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let a = c.intcon(7)?;
        let b = c.intcon(7)?;
        let other = c.intcon(8)?;
        assert_eq!(a, b);
        assert_ne!(a, other);
        Ok(())
    }

    #[test]
    fn test_box_shape_checked() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let root = c.graph().root();
        let value = c.new_node(
            Op::Vector(VectorOp::new(crate::ir::VectorOpcode::ReplicateL)),
            Type::Vect(TypeVect::new(BasicType::Long, 2)),
            vec![Some(root)],
        )?;
        let alloc = c.new_node(Op::Con(ConValue::Null), Type::Bottom, vec![])?;
        let err = c
            .make_vector_box(alloc, value, classes.int_vector, vt_int4())
            .err();
        assert!(matches!(err, Some(Error::ShapeMismatch { node, .. }) if node == value));
        Ok(())
    }

    #[test]
    fn test_unbox_requires_vector_object() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let mem = c.new_node(Op::Con(ConValue::Null), Type::Memory, vec![])?;
        let obj = c.intcon(0)?;
        let err = c.make_vector_unbox(None, mem, obj, vt_int4(), false).err();
        assert!(matches!(err, Some(Error::TypeMismatch { node, .. }) if node == obj));
        Ok(())
    }

    #[test]
    fn test_macro_nodes_tracked() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let before = c.macro_count();
        let root = c.graph().root();
        let value = c.new_node(
            Op::Vector(VectorOp::new(crate::ir::VectorOpcode::ReplicateI)),
            Type::Vect(vt_int4()),
            vec![Some(root)],
        )?;
        let alloc = c.new_node(
            Op::Con(ConValue::Null),
            Type::instance(classes.int_vector),
            vec![],
        )?;
        let vbox = c.make_vector_box(alloc, value, classes.int_vector, vt_int4())?;
        assert_eq!(c.macro_count(), before + 1);
        assert_eq!(c.macro_node(before), Some(vbox));
        assert!(c.remove_macro_node(vbox));
        assert_eq!(c.macro_count(), before);
        Ok(())
    }
}
