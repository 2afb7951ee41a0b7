//! Read-only class metadata consumed by the vector-box phase.
//!
//! The phase needs three facts about the managed runtime's class system:
//!
//! - whether a class belongs to the boxed-vector family (vector, mask or shuffle),
//! - where the payload field that holds the backing array lives, and
//! - how many argument slots a method takes.
//!
//! These are answered by a [`ClassOracle`]. The crate ships [`ClassRegistry`], an
//! in-memory oracle that is preloaded with the boxed-vector base classes and can be
//! extended with concrete box classes and methods.
//!
//! # Examples
//!
//! ```rust,ignore
//! use vecbox::meta::{ClassOracle, ClassRegistry, VectorFamily, WellKnownClass};
//!
//! let mut registry = ClassRegistry::with_vector_classes();
//! let int128 = registry.define_class("Int128Vector", WellKnownClass::Vector)?;
//! assert_eq!(registry.vector_family(int128), Some(VectorFamily::Vector));
//! ```

mod registry;

use std::fmt;

use strum::{Display, EnumIter};

use crate::{Error, Result};

pub use registry::ClassRegistry;

/// Name of the field every boxed-vector class inherits to hold its backing array.
pub const PAYLOAD_FIELD_NAME: &str = "payload";

/// Signature of the payload field: a plain object reference.
pub const OBJECT_SIGNATURE: &str = "Ljava/lang/Object;";

/// Opaque handle of a class known to a [`ClassOracle`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KlassId(u32);

impl KlassId {
    /// Creates a class handle from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index of this handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for KlassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KlassId({})", self.0)
    }
}

impl fmt::Display for KlassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k{}", self.0)
    }
}

/// Opaque handle of a method known to a [`ClassOracle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId(u32);

impl MethodId {
    /// Creates a method handle from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index of this handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Base classes the phase needs to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum WellKnownClass {
    /// Root of the class hierarchy
    Object,
    /// Common superclass of all boxed-vector classes; declares the payload field
    VectorPayload,
    /// Base of plain vector boxes
    Vector,
    /// Base of mask boxes
    VectorMask,
    /// Base of shuffle boxes
    VectorShuffle,
}

/// Member of the boxed-vector family a class belongs to.
///
/// The family decides the on-heap representation of the payload: masks are stored as
/// one boolean per lane, shuffles as one byte per lane, plain vectors in their native
/// element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum VectorFamily {
    /// Plain vector
    Vector,
    /// Vector mask
    Mask,
    /// Vector shuffle
    Shuffle,
}

/// Descriptor of a field as reported by the metadata oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Class declaring the field
    pub holder: KlassId,
    /// Simple name of the field
    pub name: String,
    /// Type signature of the field
    pub signature: String,
    /// Byte offset of the field inside an instance
    pub offset_in_bytes: u32,
    /// Whether the field is static
    pub is_static: bool,
}

/// Descriptor of a method as reported by the metadata oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Class declaring the method
    pub holder: KlassId,
    /// Simple name of the method
    pub name: String,
    /// Number of argument slots, including the receiver
    pub arg_size: u32,
}

/// Read-only view of the managed runtime's class system.
///
/// Implementations must be shareable between compilation threads; a single oracle is
/// typically shared by every [`crate::compiler::Compile`] session of a batch.
pub trait ClassOracle: Send + Sync {
    /// Returns the handle of a well-known base class, if the runtime has loaded it.
    fn well_known(&self, which: WellKnownClass) -> Option<KlassId>;

    /// Returns `true` if `klass` is `base` or a (transitive) subclass of it.
    fn is_subclass_of(&self, klass: KlassId, base: KlassId) -> bool;

    /// Returns the name of a class, for diagnostics.
    fn class_name(&self, klass: KlassId) -> Option<String>;

    /// Looks up a field declared by `holder` (or one of its superclasses).
    fn field_by_name(
        &self,
        holder: KlassId,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> Option<FieldInfo>;

    /// Returns the number of argument slots of `method`.
    fn method_arg_size(&self, method: MethodId) -> Option<u32>;

    /// Classifies `klass` into the boxed-vector family.
    ///
    /// Masks and shuffles are checked before plain vectors so that a class that is
    /// both (which a well-formed hierarchy never produces) resolves to the more
    /// specific representation.
    ///
    /// # Returns
    ///
    /// `None` if `klass` is not a boxed-vector class.
    fn vector_family(&self, klass: KlassId) -> Option<VectorFamily> {
        let is_a = |which| {
            self.well_known(which)
                .is_some_and(|base| self.is_subclass_of(klass, base))
        };
        if is_a(WellKnownClass::VectorMask) {
            Some(VectorFamily::Mask)
        } else if is_a(WellKnownClass::VectorShuffle) {
            Some(VectorFamily::Shuffle)
        } else if is_a(WellKnownClass::Vector) {
            Some(VectorFamily::Vector)
        } else {
            None
        }
    }

    /// Looks up the payload field every boxed-vector class inherits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldNotFound`] if the payload base class is not loaded or
    /// does not declare the field.
    fn payload_field(&self) -> Result<FieldInfo> {
        let holder = self.well_known(WellKnownClass::VectorPayload).ok_or_else(|| {
            Error::FieldNotFound {
                class: WellKnownClass::VectorPayload.to_string(),
                field: PAYLOAD_FIELD_NAME.to_string(),
            }
        })?;
        self.field_by_name(holder, PAYLOAD_FIELD_NAME, OBJECT_SIGNATURE, false)
            .ok_or_else(|| Error::FieldNotFound {
                class: self
                    .class_name(holder)
                    .unwrap_or_else(|| holder.to_string()),
                field: PAYLOAD_FIELD_NAME.to_string(),
            })
    }
}
