//! Sea-of-nodes intermediate representation.
//!
//! This module holds the minimal graph substrate the vector-box phase operates on:
//!
//! - `types` - the type lattice: basic types, vector shapes, pointers, alias classes
//! - `node` - node ids, operations and per-node state
//! - `vector` - the vector node catalog and its opcode tables
//! - `jvms` - debug state of safepoints
//! - `graph` - the arena store with def-use maintenance
//! - `worklist` - ordered unique node lists
//!
//! Higher-level services (node budget, value numbering, the macro list) live on the
//! compilation session in [`crate::compiler`].

mod graph;
mod jvms;
mod node;
mod types;
mod vector;
mod worklist;

pub use graph::Graph;
pub use jvms::JvmState;
pub use node::{
    ConValue, Node, NodeFlags, NodeId, Op, ProjKind, ADDP_BASE, ADDP_OFFSET, ADDRESS, BOX,
    CONTROL, FRAME_PTR, I_O, MEM, MEMORY, OBJ, PARMS, RETURN_ADR, STORED_VALUE, VALUE,
};
pub use types::{
    AliasClass, BasicType, KlassRef, OopType, RegClass, Type, TypeVect, ARRAY_BASE_OFFSET,
};
pub use vector::{Predicate, ScalarOp, VectorAttr, VectorOp, VectorOpcode};
pub use worklist::UniqueNodeList;
