//! # vecbox Prelude
//!
//! The types needed to set up a compilation session, build a graph and run the
//! vector-box phase over it.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all vecbox operations
pub use crate::Error;

/// The result type used throughout vecbox
pub use crate::Result;

// ================================================================================================
// Session and Phase
// ================================================================================================

/// Compilation session, its configuration and the graph builder
pub use crate::compiler::{
    BatchReport, BatchScheduler, Compile, EventKind, EventLog, GraphKit, ReboxingInliner,
    VectorConfig,
};

/// The phase and its statistics
pub use crate::vector::{PhaseVector, VectorStats};

// ================================================================================================
// IR and Metadata
// ================================================================================================

/// Graph, nodes and types
pub use crate::ir::{
    AliasClass, BasicType, Graph, JvmState, NodeId, Op, ProjKind, Type, TypeVect, VectorOp,
    VectorOpcode,
};

/// Class metadata
pub use crate::meta::{ClassOracle, ClassRegistry, KlassId, MethodId, VectorFamily, WellKnownClass};
