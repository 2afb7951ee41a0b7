// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # vecbox
//!
//! Vector-box elimination and expansion for a sea-of-nodes JIT compiler IR.
//!
//! A vector API exposes SIMD registers to managed code as immutable box objects. A
//! JIT that intrinsifies the API keeps values in registers and only models the
//! boxing with pending nodes. After inlining, this crate decides for every pending
//! box whether a heap object is really needed:
//!
//! - **Scalarization** - boxes that only deoptimization debug info refers to are
//!   described to the deoptimizer as scalar objects and never allocated
//! - **Expansion** - boxes that escape into calls or the heap are lowered to a real
//!   array allocation, a vector store, an object allocation and a payload store
//! - **Unbox expansion** - reads out of a box become a payload load followed by a
//!   whole-vector load, with mask and shuffle lanes widened back
//! - **Allocation elimination** - allocation calls nobody reads turn into safepoints
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vecbox::prelude::*;
//!
//! let mut registry = ClassRegistry::with_vector_classes();
//! let int128 = registry.define_class("Int128Vector", WellKnownClass::Vector)?;
//! let mut compile = Compile::new(Arc::new(registry), VectorConfig::new());
//!
//! // ... build the method graph with GraphKit ...
//!
//! let stats = PhaseVector::new().optimize_vector_boxes(&mut compile)?;
//! println!("lowered {} allocations", stats.allocations_lowered);
//! # Ok::<(), vecbox::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - node kinds, types, the graph arena with def-use edges, debug state
//! - [`meta`] - the class metadata oracle and an in-memory registry
//! - [`compiler`] - the compilation session, graph building, value numbering,
//!   cleanup, verification and a parallel batch driver
//! - [`vector`] - the vector-box phase
//! - [`Error`] and [`Result`] - error handling
//!
//! Resource exhaustion is not an error: it puts the session into a failing state,
//! after which every stage returns early. See [`compiler::Compile::failing`].

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,ignore
/// use vecbox::prelude::*;
///
/// let registry = ClassRegistry::with_vector_classes();
/// let compile = Compile::new(std::sync::Arc::new(registry), VectorConfig::new());
/// ```
pub mod prelude;

/// Sea-of-nodes intermediate representation.
///
/// # Key Types
///
/// - [`ir::Graph`] - Node arena with symmetric def-use edges and tombstones
/// - [`ir::Op`] - Node kinds, including the pending vector box kinds
/// - [`ir::Type`] and [`ir::TypeVect`] - Static node types and vector shapes
/// - [`ir::JvmState`] - Layout of the debug inputs of safepoints and calls
/// - [`ir::VectorOpcode`] - Catalog of vector operations
pub mod ir;

/// Class metadata consumed by the phase.
pub mod meta;

/// Compilation session and graph services.
pub mod compiler;

/// The vector-box elimination and expansion phase.
pub mod vector;

/// `vecbox` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `vecbox` Error type
///
/// # Examples
///
/// ```rust,ignore
/// use vecbox::{Error, vector::PhaseVector};
///
/// match PhaseVector::new().optimize_vector_boxes(&mut compile) {
///     Ok(stats) => println!("expanded {} boxes", stats.boxes_expanded),
///     Err(Error::InliningConflict) => println!("another phase is inlining"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;
