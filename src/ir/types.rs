//! Type lattice for the sea-of-nodes IR.
//!
//! Only the part of the lattice the vector-box phase observes is modelled here: the
//! abstract control/memory/I-O types of the graph plumbing, scalar primitives with
//! optional constant values, vector shapes, object pointers (instances and primitive
//! arrays), class constants, and addresses tagged with their alias class.
//!
//! # Vector Shapes
//!
//! A vector value's type is a [`TypeVect`]: an element [`BasicType`] and a lane count.
//! The byte width (`lanes × element size`) selects the register class hint
//! ([`RegClass`]) the code generator later uses.
//!
//! # Alias Classes
//!
//! Every memory operation carries an [`AliasClass`]. Two operations in different
//! classes never touch the same memory, so the precision of the class matters: an
//! array element address derived from a pointer whose static type is a *precise*
//! primitive array gets [`AliasClass::ArrayElement`], while the same address derived
//! from a generic object pointer degrades to [`AliasClass::Bottom`] and aliases
//! everything.

use std::fmt;

use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::meta::KlassId;

/// Offset of element 0 from the start of every primitive array.
pub const ARRAY_BASE_OFFSET: u32 = 16;

/// Primitive element types of the managed runtime.
///
/// The discriminant order follows the runtime's own numbering of basic types, which is
/// why `Boolean` and `Char` precede the numeric types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    EnumCount,
    Display,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum BasicType {
    /// 1-byte boolean, the on-heap lane type of vector masks
    Boolean,
    /// 2-byte unsigned character
    Char,
    /// 4-byte IEEE float
    Float,
    /// 8-byte IEEE double
    Double,
    /// 1-byte signed integer, the on-heap lane type of vector shuffles
    Byte,
    /// 2-byte signed integer
    Short,
    /// 4-byte signed integer
    Int,
    /// 8-byte signed integer
    Long,
    /// Object reference
    Object,
}

impl BasicType {
    /// Returns the size in bytes of one element of this type in an array.
    #[must_use]
    pub const fn size_in_bytes(self) -> u32 {
        match self {
            BasicType::Boolean | BasicType::Byte => 1,
            BasicType::Char | BasicType::Short => 2,
            BasicType::Int | BasicType::Float => 4,
            BasicType::Long | BasicType::Double | BasicType::Object => 8,
        }
    }

    /// Returns `true` for the two floating-point types.
    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(self, BasicType::Float | BasicType::Double)
    }

    /// Returns `true` for integral primitive types, including `boolean` and `char`.
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            BasicType::Boolean
                | BasicType::Char
                | BasicType::Byte
                | BasicType::Short
                | BasicType::Int
                | BasicType::Long
        )
    }

    /// Returns the byte offset of array element `index` for an array of this type.
    #[must_use]
    pub const fn array_element_offset(self, index: u32) -> u32 {
        ARRAY_BASE_OFFSET + index * self.size_in_bytes()
    }
}

/// Register class hint for a vector value, selected by its byte width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RegClass {
    /// 32-bit vector register
    VecS,
    /// 64-bit vector register
    VecD,
    /// 128-bit vector register
    VecX,
    /// 256-bit vector register
    VecY,
    /// 512-bit vector register
    VecZ,
}

impl RegClass {
    /// Maps a vector byte width to its register class, if the width is supported.
    #[must_use]
    pub const fn for_length_in_bytes(bytes: u32) -> Option<RegClass> {
        match bytes {
            4 => Some(RegClass::VecS),
            8 => Some(RegClass::VecD),
            16 => Some(RegClass::VecX),
            32 => Some(RegClass::VecY),
            64 => Some(RegClass::VecZ),
            _ => None,
        }
    }
}

/// Shape of a vector value: element type × lane count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeVect {
    elem: BasicType,
    length: u32,
}

impl TypeVect {
    /// Creates a vector shape of `length` lanes of `elem`.
    #[must_use]
    pub const fn new(elem: BasicType, length: u32) -> Self {
        Self { elem, length }
    }

    /// Returns the element type.
    #[must_use]
    pub const fn element_basic_type(&self) -> BasicType {
        self.elem
    }

    /// Returns the number of lanes.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// Returns the total width of the vector in bytes.
    #[must_use]
    pub const fn length_in_bytes(&self) -> u32 {
        self.length * self.elem.size_in_bytes()
    }

    /// Returns the register class hint for this shape.
    ///
    /// `None` when the byte width has no vector register class.
    #[must_use]
    pub const fn ideal_reg(&self) -> Option<RegClass> {
        RegClass::for_length_in_bytes(self.length_in_bytes())
    }

    /// Returns the same lane count with a different element type.
    #[must_use]
    pub const fn with_element(&self, elem: BasicType) -> Self {
        Self {
            elem,
            length: self.length,
        }
    }
}

impl fmt::Display for TypeVect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.elem, self.length)
    }
}

/// Memory slice identity of a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AliasClass {
    /// Unknown memory; aliases every other class
    Bottom,
    /// Raw memory of freshly allocated objects before initialization
    Raw,
    /// A specific instance field
    Field {
        /// Class declaring the field
        holder: KlassId,
        /// Byte offset of the field inside the object
        offset: u32,
    },
    /// Elements of primitive arrays of one element type
    ArrayElement(BasicType),
}

impl AliasClass {
    /// Returns `true` if accesses in `self` and `other` may touch the same memory.
    #[must_use]
    pub fn may_alias(self, other: AliasClass) -> bool {
        self == AliasClass::Bottom || other == AliasClass::Bottom || self == other
    }
}

impl fmt::Display for AliasClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasClass::Bottom => write!(f, "bottom"),
            AliasClass::Raw => write!(f, "raw"),
            AliasClass::Field { holder, offset } => write!(f, "{holder}+{offset}"),
            AliasClass::ArrayElement(bt) => write!(f, "{bt}[]"),
        }
    }
}

/// Static type of an object pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OopType {
    /// Instance of a class (or one of its subclasses)
    Instance {
        /// Static class of the instance
        klass: KlassId,
        /// Pointer is known to be non-null
        not_null: bool,
    },
    /// Primitive array with a precise element type
    Array {
        /// Element type of the array
        elem: BasicType,
        /// Pointer is known to be non-null
        not_null: bool,
    },
}

impl OopType {
    /// Returns the same pointer type with the not-null bit set.
    #[must_use]
    pub const fn cast_to_not_null(self) -> Self {
        match self {
            OopType::Instance { klass, .. } => OopType::Instance {
                klass,
                not_null: true,
            },
            OopType::Array { elem, .. } => OopType::Array {
                elem,
                not_null: true,
            },
        }
    }
}

/// A class constant: either an instance class or the class of a primitive array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KlassRef {
    /// An instance class from the metadata oracle
    Instance(KlassId),
    /// The class of arrays of a primitive element type
    Array(BasicType),
}

/// The type of a node's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Dead value; the type of the graph's top node
    Top,
    /// Unknown value
    Bottom,
    /// Control token
    Control,
    /// Memory state
    Memory,
    /// I/O state
    Io,
    /// Frame pointer
    FramePtr,
    /// Return address
    ReturnAddress,
    /// Multi-output node; consumed through projections
    Tuple,
    /// Primitive scalar, with its constant value when known
    Scalar {
        /// Primitive type of the value
        bt: BasicType,
        /// Constant value (floating-point constants are stored as raw bits)
        con: Option<i64>,
    },
    /// Raw vector value
    Vect(TypeVect),
    /// Object pointer
    Oop(OopType),
    /// Class constant
    Klass(KlassRef),
    /// Derived address into an object or array
    Address(AliasClass),
}

impl Type {
    /// Shorthand for a non-constant scalar of type `bt`.
    #[must_use]
    pub const fn scalar(bt: BasicType) -> Self {
        Type::Scalar { bt, con: None }
    }

    /// Shorthand for a constant `int`.
    #[must_use]
    pub const fn int_con(value: i32) -> Self {
        Type::Scalar {
            bt: BasicType::Int,
            con: Some(value as i64),
        }
    }

    /// Shorthand for a non-null instance pointer of `klass`.
    #[must_use]
    pub const fn instance(klass: KlassId) -> Self {
        Type::Oop(OopType::Instance {
            klass,
            not_null: true,
        })
    }

    /// Shorthand for a non-null pointer to a primitive array of `elem`.
    #[must_use]
    pub const fn array(elem: BasicType) -> Self {
        Type::Oop(OopType::Array {
            elem,
            not_null: true,
        })
    }

    /// Returns the vector shape if this is a vector type.
    #[must_use]
    pub const fn is_vect(&self) -> Option<TypeVect> {
        match self {
            Type::Vect(vt) => Some(*vt),
            _ => None,
        }
    }

    /// Returns the pointer type if this is an object pointer.
    #[must_use]
    pub const fn as_oop(&self) -> Option<OopType> {
        match self {
            Type::Oop(oop) => Some(*oop),
            _ => None,
        }
    }

    /// Returns the integer constant if this is a constant scalar.
    #[must_use]
    pub const fn get_con(&self) -> Option<i64> {
        match self {
            Type::Scalar { con, .. } => *con,
            _ => None,
        }
    }

    /// Returns `true` for the types that flow along the control/memory/I-O spine.
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        matches!(
            self,
            Type::Control | Type::Memory | Type::Io | Type::FramePtr | Type::ReturnAddress
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Top => write!(f, "top"),
            Type::Bottom => write!(f, "bottom"),
            Type::Control => write!(f, "control"),
            Type::Memory => write!(f, "memory"),
            Type::Io => write!(f, "abio"),
            Type::FramePtr => write!(f, "frameptr"),
            Type::ReturnAddress => write!(f, "return_address"),
            Type::Tuple => write!(f, "tuple"),
            Type::Scalar { bt, con: Some(c) } => write!(f, "{bt}:{c}"),
            Type::Scalar { bt, con: None } => write!(f, "{bt}"),
            Type::Vect(vt) => write!(f, "vector[{vt}]"),
            Type::Oop(OopType::Instance { klass, not_null }) => {
                write!(f, "{klass}{}", if *not_null { ":NotNull" } else { "" })
            }
            Type::Oop(OopType::Array { elem, not_null }) => {
                write!(f, "{elem}[]{}", if *not_null { ":NotNull" } else { "" })
            }
            Type::Klass(KlassRef::Instance(klass)) => write!(f, "klass {klass}"),
            Type::Klass(KlassRef::Array(elem)) => write!(f, "klass {elem}[]"),
            Type::Address(alias) => write!(f, "adr({alias})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_length_in_bytes() {
        assert_eq!(TypeVect::new(BasicType::Int, 4).length_in_bytes(), 16);
        assert_eq!(TypeVect::new(BasicType::Double, 8).length_in_bytes(), 64);
        assert_eq!(TypeVect::new(BasicType::Boolean, 16).length_in_bytes(), 16);
    }

    #[test]
    fn test_ideal_reg() {
        assert_eq!(
            TypeVect::new(BasicType::Byte, 4).ideal_reg(),
            Some(RegClass::VecS)
        );
        assert_eq!(
            TypeVect::new(BasicType::Int, 4).ideal_reg(),
            Some(RegClass::VecX)
        );
        assert_eq!(
            TypeVect::new(BasicType::Double, 8).ideal_reg(),
            Some(RegClass::VecZ)
        );
        assert_eq!(TypeVect::new(BasicType::Long, 16).ideal_reg(), None);
    }

    #[test]
    fn test_element_offsets() {
        assert_eq!(BasicType::Int.array_element_offset(0), ARRAY_BASE_OFFSET);
        assert_eq!(BasicType::Long.array_element_offset(2), ARRAY_BASE_OFFSET + 16);
    }

    #[test]
    fn test_every_basic_type_has_a_size() {
        for bt in BasicType::iter() {
            assert!(bt.size_in_bytes() >= 1);
        }
        assert_eq!(BasicType::COUNT, 9);
    }

    #[test]
    fn test_alias_classes() {
        let ints = AliasClass::ArrayElement(BasicType::Int);
        let longs = AliasClass::ArrayElement(BasicType::Long);
        assert!(!ints.may_alias(longs));
        assert!(ints.may_alias(AliasClass::Bottom));
        assert!(ints.may_alias(ints));
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeVect::new(BasicType::Float, 8).to_string(), "float x 8");
        assert_eq!(Type::array(BasicType::Byte).to_string(), "byte[]:NotNull");
        assert_eq!(Type::int_con(3).to_string(), "int:3");
    }
}
