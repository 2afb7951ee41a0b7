//! Vector box elimination and expansion.
//!
//! The vector API hands raw SIMD values to managed code as box objects. During
//! parsing and inlining, every such hand-off is modelled by three pending node kinds:
//!
//! - `VectorBox` views a raw vector as an object, over an allocation input
//! - `VectorUnbox` reads a raw vector back out of an object
//! - `VectorBoxAllocate` is the not-yet-lowered allocation call of a box object
//!
//! [`PhaseVector`] runs once per compilation, after inlining, and removes all three:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ incremental inlining scope                                        │
//! │   1. expand unboxes       payload load + LoadVector (+ conversion)│
//! │   2. scalarize boxes      debug-only uses → scalar descriptors    │
//! │                           merged boxes → one allocation per call  │
//! │   3. inline reboxing calls                                        │
//! │   4. expand boxes         array + object allocation, two stores   │
//! │   5. eliminate allocations without data uses → safepoints         │
//! └───────────────────────────────────────────────────────────────────┘
//!   6. cleanup              unreachable nodes, value numbering
//!   7. verification         when enabled
//! ```
//!
//! Each stage walks the macro list from its tail and re-clamps its position after
//! every node, since lowering a node adds and removes list entries. Every stage checks
//! [`Compile::failing`] before it starts and after each node.

mod eliminate;
mod expand;
mod scalarize;
mod unbox;

use std::sync::Arc;

use crate::{
    compiler::{
        cleanup, verify::verify_graph, Compile, EventKind, IdentityReboxingInliner,
        ReboxingInliner,
    },
    ir::{NodeId, Op, OopType, TypeVect, BOX, VALUE},
    meta::KlassId,
    Error, Result,
};

/// Summary of one phase run, derived from the session's event log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorStats {
    /// Unboxes replaced by payload loads
    pub unboxes_expanded: usize,
    /// Unboxes removed for lack of uses
    pub unboxes_removed: usize,
    /// Safepoint references to boxes replaced by scalar descriptors
    pub boxes_scalarized: usize,
    /// Calls given their own box allocation
    pub boxes_reboxed: usize,
    /// Boxes replaced by their concrete allocation
    pub boxes_expanded: usize,
    /// Box allocation calls lowered to array and object allocation
    pub allocations_lowered: usize,
    /// Box allocation calls replaced by safepoints
    pub allocations_eliminated: usize,
    /// Late reboxing calls inlined
    pub reboxing_calls_inlined: usize,
    /// Nodes removed by cleanup
    pub nodes_removed: usize,
    /// Width in bytes of the widest vector memory operation of the compilation
    pub max_vector_size: u32,
    /// The compilation ran out of resources; the graph is abandoned
    pub bailed_out: bool,
}

impl VectorStats {
    fn collect(c: &Compile, start: usize) -> Self {
        let count = |kind| c.events.count_since(kind, start);
        Self {
            unboxes_expanded: count(EventKind::UnboxExpanded),
            unboxes_removed: count(EventKind::UnboxRemoved),
            boxes_scalarized: count(EventKind::BoxScalarized),
            boxes_reboxed: count(EventKind::BoxReboxed),
            boxes_expanded: count(EventKind::BoxExpanded),
            allocations_lowered: count(EventKind::AllocationLowered),
            allocations_eliminated: count(EventKind::AllocationEliminated),
            reboxing_calls_inlined: count(EventKind::ReboxingCallInlined),
            nodes_removed: count(EventKind::DeadNodeRemoved),
            max_vector_size: c.max_vector_size(),
            bailed_out: c.failing(),
        }
    }

    /// Adds up the counters of two runs.
    ///
    /// `max_vector_size` is the wider of both; `bailed_out` is set if either run
    /// bailed out.
    #[must_use]
    pub fn merge(self, other: &VectorStats) -> Self {
        Self {
            unboxes_expanded: self.unboxes_expanded + other.unboxes_expanded,
            unboxes_removed: self.unboxes_removed + other.unboxes_removed,
            boxes_scalarized: self.boxes_scalarized + other.boxes_scalarized,
            boxes_reboxed: self.boxes_reboxed + other.boxes_reboxed,
            boxes_expanded: self.boxes_expanded + other.boxes_expanded,
            allocations_lowered: self.allocations_lowered + other.allocations_lowered,
            allocations_eliminated: self.allocations_eliminated + other.allocations_eliminated,
            reboxing_calls_inlined: self.reboxing_calls_inlined + other.reboxing_calls_inlined,
            nodes_removed: self.nodes_removed + other.nodes_removed,
            max_vector_size: self.max_vector_size.max(other.max_vector_size),
            bailed_out: self.bailed_out || other.bailed_out,
        }
    }
}

/// The vector box elimination phase.
///
/// # Examples
///
/// ```rust,ignore
/// use vecbox::prelude::*;
///
/// let stats = PhaseVector::new().optimize_vector_boxes(&mut compile)?;
/// assert_eq!(compile.graph().count(|op| matches!(op, Op::VectorBox { .. })), 0);
/// ```
#[derive(Clone)]
pub struct PhaseVector {
    inliner: Arc<dyn ReboxingInliner>,
}

impl Default for PhaseVector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PhaseVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseVector")
            .field("inliner", &self.inliner.name())
            .finish()
    }
}

impl PhaseVector {
    /// Creates the phase with the default reboxing-call inliner.
    #[must_use]
    pub fn new() -> Self {
        Self::with_inliner(Arc::new(IdentityReboxingInliner))
    }

    /// Creates the phase with a custom reboxing-call inliner.
    #[must_use]
    pub fn with_inliner(inliner: Arc<dyn ReboxingInliner>) -> Self {
        Self { inliner }
    }

    /// Removes every box, unbox and pending box allocation from the graph of `c`.
    ///
    /// Running out of resources is not an error: the stages stop, the session is left
    /// failing, and the returned statistics have `bailed_out` set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InliningConflict`] if `c` is already inlining incrementally,
    /// and an invariant error if the graph violates the shapes the phase relies on.
    /// In both cases the session is put into the failing state.
    pub fn optimize_vector_boxes(&self, c: &mut Compile) -> Result<VectorStats> {
        let start = c.events.len();
        if let Err(error) = self.run(c) {
            c.record_failure(error.to_string());
            return Err(error);
        }
        Ok(VectorStats::collect(c, start))
    }

    fn run(&self, c: &mut Compile) -> Result<()> {
        {
            let mut scope = c.incremental_inlining()?;
            scope.clear_for_igvn();

            unbox::expand_vunbox_nodes(&mut scope)?;
            scalarize::scalarize_vbox_nodes(&mut scope)?;
            if !scope.failing() {
                self.inliner.inline_vector_reboxing_calls(&mut scope)?;
            }
            expand::expand_vbox_nodes(&mut scope)?;
            eliminate::eliminate_vbox_alloc_nodes(&mut scope)?;
        }

        if c.failing() {
            return Ok(());
        }
        cleanup::do_cleanup(c)?;

        if c.config().verify_result && !c.failing() {
            verify_graph(c)?;
        }
        Ok(())
    }
}

/// Visits the macro nodes selected by `pred`, from the tail of the list.
///
/// The position is re-clamped to the list length after each node, so entries the
/// callback appends are not visited and removals never skip a node.
fn for_each_macro_node(
    c: &mut Compile,
    pred: impl Fn(&Op) -> bool,
    mut f: impl FnMut(&mut Compile, NodeId) -> Result<()>,
) -> Result<()> {
    if c.failing() {
        return Ok(());
    }
    let mut next = c.macro_count();
    while next > 0 {
        let index = next - 1;
        if let Some(n) = c.macro_node(index) {
            if c.graph().op(n).is_some_and(&pred) {
                f(c, n)?;
            }
        }
        if c.failing() {
            return Ok(());
        }
        next = index.min(c.macro_count());
    }
    Ok(())
}

/// Inputs and attributes of a box node.
#[derive(Debug, Clone, Copy)]
struct BoxParts {
    allocation: NodeId,
    value: NodeId,
    klass: KlassId,
    vt: TypeVect,
}

fn box_parts(c: &Compile, vbox: NodeId) -> Result<BoxParts> {
    let node = c.graph().node(vbox)?;
    let Op::VectorBox { vt } = *node.op() else {
        return Err(Error::UnexpectedNode {
            node: vbox,
            expected: "VectorBox",
            actual: node.op().name().to_string(),
        });
    };
    let allocation = node
        .input(BOX)
        .ok_or_else(|| invariant_error!("{} has no allocation input", vbox))?;
    let value = node
        .input(VALUE)
        .ok_or_else(|| invariant_error!("{} has no value input", vbox))?;
    let Some(OopType::Instance { klass, .. }) = node.ty().as_oop() else {
        return Err(Error::TypeMismatch {
            node: vbox,
            expected: "boxed vector instance".to_string(),
            actual: node.ty().to_string(),
        });
    };
    Ok(BoxParts {
        allocation,
        value,
        klass,
        vt,
    })
}
