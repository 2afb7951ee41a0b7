//! Nodes of the sea-of-nodes graph.
//!
//! A [`Node`] is an operation ([`Op`]) with a result [`Type`], an ordered list of
//! input edges and the reverse list of its uses. Inputs are positional; an absent
//! input is `None`. Control, I/O and memory are ordinary inputs, so the positions of
//! the plumbing edges are fixed per operation kind:
//!
//! ```text
//! calls / safepoints   [Control, I_O, Memory, FramePtr, ReturnAdr, Parms.., debug..]
//! allocations          [Control, I_O, Memory, FramePtr, ReturnAdr, Klass, Length?]
//! loads                [Control?, Memory, Address]
//! stores               [Control?, Memory, Address, Value]
//! VectorBox            [-, Box, Value]
//! VectorUnbox          [Control?, Memory, Obj]
//! Phi                  [Region, values..]
//! Proj                 [Owner]
//! AddP                 [-, Base, Address, Offset]
//! ```

use std::fmt;

use bitflags::bitflags;

use crate::{
    ir::{AliasClass, BasicType, JvmState, KlassRef, Type, TypeVect, VectorOp},
    meta::{KlassId, MethodId},
};

/// Input position of the control edge.
pub const CONTROL: usize = 0;
/// Input position of the I/O edge of calls, safepoints and allocations.
pub const I_O: usize = 1;
/// Input position of the memory edge of calls, safepoints and allocations.
pub const MEMORY: usize = 2;
/// Input position of the frame pointer edge.
pub const FRAME_PTR: usize = 3;
/// Input position of the return address edge.
pub const RETURN_ADR: usize = 4;
/// First argument position of calls; also the first input after the plumbing edges.
pub const PARMS: usize = 5;

/// Input position of the allocation input of a `VectorBox`.
pub const BOX: usize = 1;
/// Input position of the vector value input of a `VectorBox`.
pub const VALUE: usize = 2;

/// Input position of the memory input of loads, stores and `VectorUnbox`.
pub const MEM: usize = 1;
/// Input position of the address input of loads and stores.
pub const ADDRESS: usize = 2;
/// Input position of the stored value of stores.
pub const STORED_VALUE: usize = 3;
/// Input position of the boxed object input of a `VectorUnbox`.
pub const OBJ: usize = 2;

/// Input position of the base object of an `AddP`.
pub const ADDP_BASE: usize = 1;
/// Input position of the offset constant of an `AddP`.
pub const ADDP_OFFSET: usize = 3;

/// A strongly-typed identifier for nodes within a [`crate::ir::Graph`].
///
/// `NodeId` wraps the node's arena index. Ids are assigned sequentially when nodes are
/// created and stay stable until the graph is compacted, see
/// [`crate::ir::Graph::compact`].
///
/// # Examples
///
/// ```rust,ignore
/// use vecbox::ir::NodeId;
///
/// let node = NodeId::new(7);
/// assert_eq!(node.index(), 7);
/// assert_eq!(node.to_string(), "n7");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    ///
    /// Intended for tests and for remapping tables; regular ids come from node creation.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

bitflags! {
    /// Per-node state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// Node is a pending high-level operation tracked in the macro list
        const MACRO = 0b0000_0001;
        /// Node has been removed; its slot is a tombstone until compaction
        const DEAD = 0b0000_0010;
    }
}

/// Which output of a multi-output node a projection selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProjKind {
    /// Normal control continuation
    Control,
    /// I/O state after the node
    Io,
    /// Memory state after the node
    Memory,
    /// Frame pointer (start node only)
    FramePtr,
    /// Return address (start node only)
    ReturnAdr,
    /// Incoming parameter `n` (start node only)
    Parm(u32),
    /// Result value of a call or allocation
    Result,
    /// Exceptional control continuation of a call
    CatchAll,
    /// Taken branch of an `If`
    IfTrue,
    /// Fall-through branch of an `If`
    IfFalse,
}

/// Value of a constant node.
///
/// Floating-point constants are stored as raw bits so that constants hash and compare
/// structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConValue {
    /// 32-bit integer (also used for boolean, byte, char and short)
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Bits of a 32-bit float
    Float(u32),
    /// Bits of a 64-bit double
    Double(u64),
    /// Class constant
    Klass(KlassRef),
    /// The null reference
    Null,
}

impl ConValue {
    /// Creates a float constant.
    #[must_use]
    pub fn float(value: f32) -> Self {
        ConValue::Float(value.to_bits())
    }

    /// Creates a double constant.
    #[must_use]
    pub fn double(value: f64) -> Self {
        ConValue::Double(value.to_bits())
    }

    /// Returns the static type of this constant.
    #[must_use]
    pub fn ty(self) -> Type {
        match self {
            ConValue::Int(v) => Type::int_con(v),
            ConValue::Long(v) => Type::Scalar {
                bt: BasicType::Long,
                con: Some(v),
            },
            ConValue::Float(bits) => Type::Scalar {
                bt: BasicType::Float,
                con: Some(i64::from(bits)),
            },
            ConValue::Double(bits) => Type::Scalar {
                bt: BasicType::Double,
                con: Some(bits as i64),
            },
            ConValue::Klass(klass) => Type::Klass(klass),
            ConValue::Null => Type::Bottom,
        }
    }
}

/// Operation of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    /// Graph root; its inputs are the method's terminators
    Root,
    /// The dead value
    Top,
    /// Method entry; projections give the initial state and parameters
    Start,
    /// Constant
    Con(ConValue),
    /// Control merge; inputs 1.. are the incoming control paths
    Region,
    /// Value merge over a region
    Phi,
    /// Two-way branch
    If,
    /// Projection of a multi-output node
    Proj(ProjKind),
    /// Normal method exit
    Return,
    /// Deoptimizing exit taken on an exceptional path
    UncommonTrap,
    /// Safepoint poll carrying debug state
    SafePoint,
    /// Static Java call
    CallStaticJava {
        /// Called method
        method: MethodId,
    },
    /// Pending allocation of a vector box object
    VectorBoxAllocate {
        /// Class of the box to allocate
        box_klass: KlassId,
    },
    /// Instance allocation
    Allocate,
    /// Primitive array allocation
    AllocateArray,
    /// Typed view of a freshly allocated raw pointer
    CheckCastPP,
    /// Pointer cast sharpening the static type
    CastPP,
    /// Address arithmetic: base plus constant offset
    AddP,
    /// Scalar or reference load
    Load {
        /// Memory slice read
        alias: AliasClass,
    },
    /// Scalar or reference store
    Store {
        /// Memory slice written
        alias: AliasClass,
    },
    /// Whole-vector load
    LoadVector {
        /// Memory slice read
        alias: AliasClass,
    },
    /// Whole-vector store
    StoreVector {
        /// Memory slice written
        alias: AliasClass,
    },
    /// Memory state merging per-slice states over a base state
    MergeMem {
        /// Slice of each input from position 2 on
        slices: Vec<AliasClass>,
    },
    /// Debug-info description of a scalar-replaced object
    SafePointScalarObject {
        /// Class of the replaced object
        klass: KlassId,
        /// Offset of the first field value, relative to the safepoint's `scloff`
        first_index: u32,
        /// Number of field values
        n_fields: u32,
    },
    /// Raw vector value viewed as a managed box object
    VectorBox {
        /// Declared vector shape
        vt: TypeVect,
    },
    /// Raw vector value read out of a managed box object
    VectorUnbox {
        /// A shuffle is unboxed as a plain vector of the requested element type
        shuffle_to_vector: bool,
    },
    /// Node of the vector catalog
    Vector(VectorOp),
}

impl Op {
    /// Returns a short name of the operation kind, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Op::Root => "Root",
            Op::Top => "Top",
            Op::Start => "Start",
            Op::Con(_) => "Con",
            Op::Region => "Region",
            Op::Phi => "Phi",
            Op::If => "If",
            Op::Proj(_) => "Proj",
            Op::Return => "Return",
            Op::UncommonTrap => "UncommonTrap",
            Op::SafePoint => "SafePoint",
            Op::CallStaticJava { .. } => "CallStaticJava",
            Op::VectorBoxAllocate { .. } => "VectorBoxAllocate",
            Op::Allocate => "Allocate",
            Op::AllocateArray => "AllocateArray",
            Op::CheckCastPP => "CheckCastPP",
            Op::CastPP => "CastPP",
            Op::AddP => "AddP",
            Op::Load { .. } => "Load",
            Op::Store { .. } => "Store",
            Op::LoadVector { .. } => "LoadVector",
            Op::StoreVector { .. } => "StoreVector",
            Op::MergeMem { .. } => "MergeMem",
            Op::SafePointScalarObject { .. } => "SafePointScalarObject",
            Op::VectorBox { .. } => "VectorBox",
            Op::VectorUnbox { .. } => "VectorUnbox",
            Op::Vector(op) => op.opcode.into(),
        }
    }

    /// Returns `true` for nodes that carry debug state.
    #[must_use]
    pub fn is_safepoint(&self) -> bool {
        matches!(
            self,
            Op::SafePoint | Op::CallStaticJava { .. } | Op::VectorBoxAllocate { .. }
        )
    }

    /// Returns `true` for Java calls, including the pending box allocation call.
    #[must_use]
    pub fn is_call_java(&self) -> bool {
        matches!(self, Op::CallStaticJava { .. } | Op::VectorBoxAllocate { .. })
    }

    /// Returns `true` for nodes lowered by a later phase and tracked as macro nodes.
    #[must_use]
    pub fn is_macro(&self) -> bool {
        matches!(
            self,
            Op::VectorBox { .. }
                | Op::VectorUnbox { .. }
                | Op::VectorBoxAllocate { .. }
                | Op::Allocate
                | Op::AllocateArray
        )
    }

    /// Returns `true` for multi-output nodes consumed through projections.
    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(
            self,
            Op::Start
                | Op::If
                | Op::CallStaticJava { .. }
                | Op::VectorBoxAllocate { .. }
                | Op::Allocate
                | Op::AllocateArray
        )
    }

    /// Returns `true` for method exits hanging off the root.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Return | Op::UncommonTrap)
    }

    /// Returns `true` if two nodes with this operation, type and inputs always compute
    /// the same value, so value numbering may common them.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            Op::Con(_)
                | Op::Phi
                | Op::Proj(_)
                | Op::CastPP
                | Op::AddP
                | Op::Load { .. }
                | Op::LoadVector { .. }
                | Op::MergeMem { .. }
                | Op::Vector(_)
        )
    }
}

/// A node of the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) op: Op,
    pub(crate) ty: Type,
    pub(crate) inputs: Vec<Option<NodeId>>,
    pub(crate) outs: Vec<NodeId>,
    pub(crate) flags: NodeFlags,
    pub(crate) jvms: Option<JvmState>,
}

impl Node {
    pub(crate) fn new(op: Op, ty: Type, inputs: Vec<Option<NodeId>>) -> Self {
        let flags = if op.is_macro() {
            NodeFlags::MACRO
        } else {
            NodeFlags::empty()
        };
        Self {
            op,
            ty,
            inputs,
            outs: Vec::new(),
            flags,
            jvms: None,
        }
    }

    /// Returns the operation of this node.
    #[must_use]
    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Returns the result type of this node.
    #[must_use]
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Returns the input edges.
    #[must_use]
    pub fn inputs(&self) -> &[Option<NodeId>] {
        &self.inputs
    }

    /// Returns input `index`, or `None` if it is absent or out of range.
    #[must_use]
    pub fn input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).copied().flatten()
    }

    /// Returns the number of input positions (present or absent).
    #[must_use]
    pub fn req(&self) -> usize {
        self.inputs.len()
    }

    /// Returns the nodes using this node, one entry per use edge.
    #[must_use]
    pub fn outs(&self) -> &[NodeId] {
        &self.outs
    }

    /// Returns the number of use edges.
    #[must_use]
    pub fn outcnt(&self) -> usize {
        self.outs.len()
    }

    /// Returns the state bits.
    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Returns the debug state of a safepoint or call.
    #[must_use]
    pub fn jvms(&self) -> Option<&JvmState> {
        self.jvms.as_ref()
    }

    /// Returns `true` unless the node has been removed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.flags.contains(NodeFlags::DEAD)
    }

    /// Returns `true` if the node is tracked in the macro list.
    #[must_use]
    pub fn is_macro(&self) -> bool {
        self.flags.contains(NodeFlags::MACRO)
    }

    /// Returns the vector shape of the node's result, if it is a vector.
    #[must_use]
    pub fn vect_type(&self) -> Option<TypeVect> {
        self.ty.is_vect()
    }

    /// Returns the projection kind if this node is a projection.
    #[must_use]
    pub fn proj_kind(&self) -> Option<ProjKind> {
        match self.op {
            Op::Proj(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns `true` if `n` is a real argument of this call, outside the debug range.
    #[must_use]
    pub fn has_non_debug_use(&self, n: NodeId) -> bool {
        let Some(jvms) = &self.jvms else {
            return false;
        };
        if !self.op.is_call_java() {
            return false;
        }
        let end = jvms.debug_start().min(self.inputs.len());
        (PARMS..end).any(|i| self.inputs[i] == Some(n))
    }

    /// Returns the call arguments: the inputs between the plumbing edges and the
    /// debug range.
    #[must_use]
    pub fn call_args(&self) -> &[Option<NodeId>] {
        match &self.jvms {
            Some(jvms) if self.op.is_call_java() => {
                let end = jvms.debug_start().min(self.inputs.len());
                self.inputs.get(PARMS..end).unwrap_or(&[])
            }
            _ => &[],
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op.name())?;
        match &self.op {
            Op::Proj(kind) => write!(f, "#{kind:?}")?,
            Op::Con(value) => write!(f, "#{value:?}")?,
            Op::Vector(op) if op.attr != crate::ir::VectorAttr::None => {
                write!(f, "#{:?}", op.attr)?;
            }
            _ => {}
        }
        write!(f, " === ")?;
        for input in &self.inputs {
            match input {
                Some(id) => write!(f, "{id} ")?,
                None => write!(f, "_ ")?,
            }
        }
        write!(f, " [[ ")?;
        for out in &self.outs {
            write!(f, "{out} ")?;
        }
        write!(f, "]] {}", self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_node_id() {
        let node = NodeId::new(42);
        assert_eq!(node.index(), 42);
        assert_eq!(format!("{node}"), "n42");
        assert_eq!(format!("{node:?}"), "NodeId(42)");
        assert_eq!(usize::from(NodeId::from(5)), 5);
    }

    #[test]
    fn test_node_id_hash() {
        let mut set = HashSet::new();
        set.insert(NodeId::new(1));
        set.insert(NodeId::new(2));
        set.insert(NodeId::new(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_macro_flag_on_creation() {
        let vt = TypeVect::new(BasicType::Int, 4);
        let node = Node::new(Op::VectorBox { vt }, Type::Bottom, vec![None, None, None]);
        assert!(node.is_macro());
        assert!(node.is_live());

        let add = Node::new(
            Op::Vector(VectorOp::new(crate::ir::VectorOpcode::AddVI)),
            Type::Vect(vt),
            vec![None, None, None],
        );
        assert!(!add.is_macro());
        assert!(add.op().is_pure());
    }

    #[test]
    fn test_op_classification() {
        let call = Op::CallStaticJava {
            method: MethodId::new(0),
        };
        assert!(call.is_safepoint());
        assert!(call.is_call_java());
        assert!(!call.is_pure());
        assert!(Op::SafePoint.is_safepoint());
        assert!(!Op::SafePoint.is_call_java());
        assert!(Op::UncommonTrap.is_terminator());
        assert_eq!(
            Op::Vector(VectorOp::new(crate::ir::VectorOpcode::VectorCastB2X)).name(),
            "VectorCastB2X"
        );
    }

    #[test]
    fn test_con_types() {
        assert_eq!(ConValue::Int(3).ty(), Type::int_con(3));
        assert_eq!(ConValue::float(1.0), ConValue::Float(1.0f32.to_bits()));
        assert!(matches!(
            ConValue::Klass(KlassRef::Array(BasicType::Int)).ty(),
            Type::Klass(_)
        ));
    }
}
