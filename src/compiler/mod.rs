//! Compilation session and graph services used by the vector-box phase.
//!
//! This module provides the layer between the IR and the phase itself:
//!
//! - [`crate::ir`] - nodes, types and the graph arena
//! - [`compiler`](self) - session state, graph building, value numbering, cleanup
//! - [`crate::vector`] - the vector-box phase
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compilation Session                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Compile                     Per-method session state            │
//! │    ├─ Graph                   (node arena, def-use edges)        │
//! │    ├─ Macro list              (pending expansions, in order)     │
//! │    ├─ Revisit set             (nodes for iterative GVN)          │
//! │    ├─ Failing flag            (bailout on resource exhaustion)   │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  GraphKit                    Builds code at a safepoint          │
//! │    ├─ Debug state map         (locals, stack, monitors)          │
//! │    ├─ Memory state            (per alias class)                  │
//! │    └─ Calls, allocations, stores, call replacement               │
//! │                                                                  │
//! │  PhaseIterGvn                Identity folding and commoning      │
//! │  cleanup                     Unreachable removal, then IGVN      │
//! │  verify                      Post-phase structural checks        │
//! │                                                                  │
//! │  ReboxingInliner             Late inlining of reboxing calls     │
//! │  BatchScheduler              Parallel runs over many sessions    │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod cleanup;
mod config;
mod events;
mod gvn;
mod inliner;
mod kit;
mod scheduler;
mod session;
pub mod verify;

pub use cleanup::CleanupStats;
pub use config::VectorConfig;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use gvn::{IgvnStats, PhaseIterGvn};
pub use inliner::{IdentityReboxingInliner, ReboxingInliner};
pub use kit::GraphKit;
pub use scheduler::{BatchReport, BatchScheduler};
pub use session::{Compile, InliningScope};
