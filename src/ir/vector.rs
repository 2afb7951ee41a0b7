//! Vector node catalog.
//!
//! Every per-element vector operation of the IR is a [`VectorOp`]: a [`VectorOpcode`]
//! plus the few attributes that distinguish otherwise identical nodes (comparison
//! predicate, mask width, source shape of a reinterpretation). The phase itself only
//! creates a handful of these (store/load mask, load shuffle, byte casts), but the
//! graphs it receives contain the whole catalog, and value numbering must tell them
//! apart.
//!
//! # Opcode Tables
//!
//! Frontends map a scalar operation and an element type to the matching vector
//! opcode through the table functions on [`VectorOpcode`]:
//!
//! | Function | Maps |
//! |----------|------|
//! | [`VectorOpcode::for_operation`] | element-wise arithmetic, logic and shifts |
//! | [`VectorOpcode::reduction`] | lane reductions to a scalar |
//! | [`VectorOpcode::replicate`] | scalar broadcast |
//! | [`VectorOpcode::pack`] | packing scalars into lanes |
//! | [`VectorOpcode::extract`] | single lane extraction |
//! | [`VectorOpcode::cast_from`] | lane-wise conversion from an element type |
//!
//! A table returns `None` when no vector form exists for the combination.

use std::ops::Range;

use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::ir::{BasicType, ConValue, TypeVect};

/// Identity of a node in the vector catalog.
#[allow(missing_docs)]
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
pub enum VectorOpcode {
    // Element-wise arithmetic
    AddVB,
    AddVS,
    AddVI,
    AddVL,
    AddVF,
    AddVD,
    SubVB,
    SubVS,
    SubVI,
    SubVL,
    SubVF,
    SubVD,
    MulVB,
    MulVS,
    MulVI,
    MulVL,
    MulVF,
    MulVD,
    FmaVD,
    FmaVF,
    CMoveVF,
    CMoveVD,
    DivVF,
    DivVD,
    MinV,
    MaxV,
    AbsV,
    AbsVF,
    AbsVD,
    NegVI,
    NegVF,
    NegVD,
    PopCountVI,
    SqrtVF,
    SqrtVD,
    NotV,

    // Shifts
    LShiftVB,
    LShiftVS,
    LShiftVI,
    LShiftVL,
    RShiftVB,
    RShiftVS,
    RShiftVI,
    RShiftVL,
    URShiftVB,
    URShiftVS,
    URShiftVI,
    URShiftVL,
    LShiftCntV,
    RShiftCntV,

    // Bitwise logic
    AndV,
    OrV,
    XorV,

    // Reductions
    AddReductionVI,
    AddReductionVL,
    AddReductionVF,
    AddReductionVD,
    SubReductionV,
    SubReductionVFP,
    MulReductionVI,
    MulReductionVL,
    MulReductionVF,
    MulReductionVD,
    AndReductionV,
    OrReductionV,
    XorReductionV,
    MinReductionV,
    MaxReductionV,

    // Lane construction and extraction
    ReplicateB,
    ReplicateS,
    ReplicateI,
    ReplicateL,
    ReplicateF,
    ReplicateD,
    PackB,
    PackS,
    PackI,
    PackL,
    PackF,
    PackD,
    Pack2L,
    Pack2D,
    ExtractB,
    ExtractUB,
    ExtractC,
    ExtractS,
    ExtractI,
    ExtractL,
    ExtractF,
    ExtractD,
    VectorInsert,

    // Masks, shuffles and conversions
    SetVectMaskI,
    VectorMaskCmp,
    VectorMaskWrapper,
    VectorTest,
    VectorBlend,
    VectorLoadMask,
    VectorStoreMask,
    VectorLoadShuffle,
    VectorReinterpret,
    VectorCastB2X,
    VectorCastS2X,
    VectorCastI2X,
    VectorCastL2X,
    VectorCastF2X,
    VectorCastD2X,
}

/// Scalar operation a vector opcode is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum ScalarOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Minimum
    Min,
    /// Maximum
    Max,
    /// Absolute value
    Abs,
    /// Negation
    Neg,
    /// Square root
    Sqrt,
    /// Population count
    PopCount,
    /// Fused multiply-add
    Fma,
    /// Conditional move
    CMove,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise exclusive or
    Xor,
    /// Bitwise not
    Not,
    /// Left shift
    LShift,
    /// Arithmetic right shift
    RShift,
    /// Logical right shift
    URShift,
}

/// Comparison predicate of mask comparisons and vector tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Predicate {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Every lane of the mask is set
    AllTrue,
    /// At least one lane of the mask is set
    AnyTrue,
}

/// Attribute distinguishing catalog nodes that share an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorAttr {
    /// No attribute
    None,
    /// Comparison predicate (`VectorMaskCmp`, `VectorTest`)
    Predicate(Predicate),
    /// Width in bytes of one input mask lane (`VectorStoreMask`)
    MaskSize(u32),
    /// Shape of the reinterpreted input (`VectorReinterpret`)
    Source(TypeVect),
}

/// A node of the vector catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorOp {
    /// Opcode of the node
    pub opcode: VectorOpcode,
    /// Distinguishing attribute
    pub attr: VectorAttr,
}

impl VectorOp {
    /// Creates a catalog node without attributes.
    #[must_use]
    pub const fn new(opcode: VectorOpcode) -> Self {
        Self {
            opcode,
            attr: VectorAttr::None,
        }
    }

    /// Creates a `VectorStoreMask` narrowing lanes of `in_type` to one boolean each.
    #[must_use]
    pub const fn store_mask(in_type: BasicType) -> Self {
        Self {
            opcode: VectorOpcode::VectorStoreMask,
            attr: VectorAttr::MaskSize(in_type.size_in_bytes()),
        }
    }

    /// Creates a `VectorReinterpret` from the shape `src`.
    #[must_use]
    pub const fn reinterpret(src: TypeVect) -> Self {
        Self {
            opcode: VectorOpcode::VectorReinterpret,
            attr: VectorAttr::Source(src),
        }
    }

    /// Creates a comparison node with `predicate`.
    #[must_use]
    pub const fn compare(opcode: VectorOpcode, predicate: Predicate) -> Self {
        Self {
            opcode,
            attr: VectorAttr::Predicate(predicate),
        }
    }
}

/// Storage class of an element for opcode selection; `boolean` behaves like `byte` and
/// `char` like `short`.
const fn lane_class(bt: BasicType) -> BasicType {
    match bt {
        BasicType::Boolean => BasicType::Byte,
        BasicType::Char => BasicType::Short,
        other => other,
    }
}

impl VectorOpcode {
    /// Maps an element-wise scalar operation on `bt` to its vector opcode.
    #[must_use]
    pub fn for_operation(op: ScalarOp, bt: BasicType) -> Option<VectorOpcode> {
        use BasicType as T;
        use VectorOpcode as V;

        let lanes = lane_class(bt);
        let by_type = |b, s, i, l, f, d| match lanes {
            T::Byte => b,
            T::Short => s,
            T::Int => i,
            T::Long => l,
            T::Float => f,
            T::Double => d,
            _ => None,
        };

        match op {
            ScalarOp::Add => by_type(
                Some(V::AddVB),
                Some(V::AddVS),
                Some(V::AddVI),
                Some(V::AddVL),
                Some(V::AddVF),
                Some(V::AddVD),
            ),
            ScalarOp::Sub => by_type(
                Some(V::SubVB),
                Some(V::SubVS),
                Some(V::SubVI),
                Some(V::SubVL),
                Some(V::SubVF),
                Some(V::SubVD),
            ),
            ScalarOp::Mul => by_type(
                Some(V::MulVB),
                Some(V::MulVS),
                Some(V::MulVI),
                Some(V::MulVL),
                Some(V::MulVF),
                Some(V::MulVD),
            ),
            ScalarOp::Div => by_type(None, None, None, None, Some(V::DivVF), Some(V::DivVD)),
            ScalarOp::Min => (lanes != T::Object).then_some(V::MinV),
            ScalarOp::Max => (lanes != T::Object).then_some(V::MaxV),
            ScalarOp::Abs => by_type(
                Some(V::AbsV),
                Some(V::AbsV),
                Some(V::AbsV),
                Some(V::AbsV),
                Some(V::AbsVF),
                Some(V::AbsVD),
            ),
            ScalarOp::Neg => by_type(
                None,
                None,
                Some(V::NegVI),
                None,
                Some(V::NegVF),
                Some(V::NegVD),
            ),
            ScalarOp::Sqrt => by_type(None, None, None, None, Some(V::SqrtVF), Some(V::SqrtVD)),
            ScalarOp::PopCount => by_type(None, None, Some(V::PopCountVI), None, None, None),
            ScalarOp::Fma => by_type(None, None, None, None, Some(V::FmaVF), Some(V::FmaVD)),
            ScalarOp::CMove => by_type(None, None, None, None, Some(V::CMoveVF), Some(V::CMoveVD)),
            ScalarOp::And => lanes.is_integral().then_some(V::AndV),
            ScalarOp::Or => lanes.is_integral().then_some(V::OrV),
            ScalarOp::Xor => lanes.is_integral().then_some(V::XorV),
            ScalarOp::Not => lanes.is_integral().then_some(V::NotV),
            ScalarOp::LShift => by_type(
                Some(V::LShiftVB),
                Some(V::LShiftVS),
                Some(V::LShiftVI),
                Some(V::LShiftVL),
                None,
                None,
            ),
            ScalarOp::RShift => by_type(
                Some(V::RShiftVB),
                Some(V::RShiftVS),
                Some(V::RShiftVI),
                Some(V::RShiftVL),
                None,
                None,
            ),
            ScalarOp::URShift => by_type(
                Some(V::URShiftVB),
                Some(V::URShiftVS),
                Some(V::URShiftVI),
                Some(V::URShiftVL),
                None,
                None,
            ),
        }
    }

    /// Maps a reduction of `op` over lanes of `bt` to its reduction opcode.
    #[must_use]
    pub fn reduction(op: ScalarOp, bt: BasicType) -> Option<VectorOpcode> {
        use BasicType as T;
        use VectorOpcode as V;

        let lanes = lane_class(bt);
        match (op, lanes) {
            (ScalarOp::Add, T::Byte | T::Short | T::Int) => Some(V::AddReductionVI),
            (ScalarOp::Add, T::Long) => Some(V::AddReductionVL),
            (ScalarOp::Add, T::Float) => Some(V::AddReductionVF),
            (ScalarOp::Add, T::Double) => Some(V::AddReductionVD),
            (ScalarOp::Sub, T::Byte | T::Short | T::Int | T::Long) => Some(V::SubReductionV),
            (ScalarOp::Sub, T::Float | T::Double) => Some(V::SubReductionVFP),
            (ScalarOp::Mul, T::Byte | T::Short | T::Int) => Some(V::MulReductionVI),
            (ScalarOp::Mul, T::Long) => Some(V::MulReductionVL),
            (ScalarOp::Mul, T::Float) => Some(V::MulReductionVF),
            (ScalarOp::Mul, T::Double) => Some(V::MulReductionVD),
            (ScalarOp::And, l) if l.is_integral() => Some(V::AndReductionV),
            (ScalarOp::Or, l) if l.is_integral() => Some(V::OrReductionV),
            (ScalarOp::Xor, l) if l.is_integral() => Some(V::XorReductionV),
            (ScalarOp::Min, l) if l != T::Object => Some(V::MinReductionV),
            (ScalarOp::Max, l) if l != T::Object => Some(V::MaxReductionV),
            _ => None,
        }
    }

    /// Returns the opcode broadcasting a scalar of `bt` to every lane.
    #[must_use]
    pub fn replicate(bt: BasicType) -> Option<VectorOpcode> {
        match lane_class(bt) {
            BasicType::Byte => Some(VectorOpcode::ReplicateB),
            BasicType::Short => Some(VectorOpcode::ReplicateS),
            BasicType::Int => Some(VectorOpcode::ReplicateI),
            BasicType::Long => Some(VectorOpcode::ReplicateL),
            BasicType::Float => Some(VectorOpcode::ReplicateF),
            BasicType::Double => Some(VectorOpcode::ReplicateD),
            _ => None,
        }
    }

    /// Returns the opcode packing scalars of `bt` into lanes.
    #[must_use]
    pub fn pack(bt: BasicType) -> Option<VectorOpcode> {
        match lane_class(bt) {
            BasicType::Byte => Some(VectorOpcode::PackB),
            BasicType::Short => Some(VectorOpcode::PackS),
            BasicType::Int => Some(VectorOpcode::PackI),
            BasicType::Long => Some(VectorOpcode::PackL),
            BasicType::Float => Some(VectorOpcode::PackF),
            BasicType::Double => Some(VectorOpcode::PackD),
            _ => None,
        }
    }

    /// Returns the opcode packing two already packed halves of 64-bit lanes.
    #[must_use]
    pub fn pack_pair(bt: BasicType) -> Option<VectorOpcode> {
        match bt {
            BasicType::Long => Some(VectorOpcode::Pack2L),
            BasicType::Double => Some(VectorOpcode::Pack2D),
            _ => None,
        }
    }

    /// Returns the opcode extracting one lane of `bt`.
    ///
    /// Booleans are extracted zero-extended, every other integral type sign-extended.
    #[must_use]
    pub fn extract(bt: BasicType) -> Option<VectorOpcode> {
        match bt {
            BasicType::Boolean => Some(VectorOpcode::ExtractUB),
            BasicType::Byte => Some(VectorOpcode::ExtractB),
            BasicType::Char => Some(VectorOpcode::ExtractC),
            BasicType::Short => Some(VectorOpcode::ExtractS),
            BasicType::Int => Some(VectorOpcode::ExtractI),
            BasicType::Long => Some(VectorOpcode::ExtractL),
            BasicType::Float => Some(VectorOpcode::ExtractF),
            BasicType::Double => Some(VectorOpcode::ExtractD),
            BasicType::Object => None,
        }
    }

    /// Returns the lane-wise conversion opcode whose input lanes are `bt`.
    #[must_use]
    pub fn cast_from(bt: BasicType) -> Option<VectorOpcode> {
        match bt {
            BasicType::Byte => Some(VectorOpcode::VectorCastB2X),
            BasicType::Short => Some(VectorOpcode::VectorCastS2X),
            BasicType::Int => Some(VectorOpcode::VectorCastI2X),
            BasicType::Long => Some(VectorOpcode::VectorCastL2X),
            BasicType::Float => Some(VectorOpcode::VectorCastF2X),
            BasicType::Double => Some(VectorOpcode::VectorCastD2X),
            _ => None,
        }
    }

    /// Returns the shift-count opcode matching a shift opcode.
    #[must_use]
    pub fn shift_count(self) -> Option<VectorOpcode> {
        use VectorOpcode as V;
        match self {
            V::LShiftVB | V::LShiftVS | V::LShiftVI | V::LShiftVL => Some(V::LShiftCntV),
            V::RShiftVB
            | V::RShiftVS
            | V::RShiftVI
            | V::RShiftVL
            | V::URShiftVB
            | V::URShiftVS
            | V::URShiftVI
            | V::URShiftVL => Some(V::RShiftCntV),
            _ => None,
        }
    }

    /// Returns `true` for lane shifts.
    #[must_use]
    pub fn is_shift(self) -> bool {
        self.shift_count().is_some()
    }

    /// Returns `true` for reductions, whose result is a scalar.
    #[must_use]
    pub fn is_reduction(self) -> bool {
        use VectorOpcode as V;
        matches!(
            self,
            V::AddReductionVI
                | V::AddReductionVL
                | V::AddReductionVF
                | V::AddReductionVD
                | V::SubReductionV
                | V::SubReductionVFP
                | V::MulReductionVI
                | V::MulReductionVL
                | V::MulReductionVF
                | V::MulReductionVD
                | V::AndReductionV
                | V::OrReductionV
                | V::XorReductionV
                | V::MinReductionV
                | V::MaxReductionV
        )
    }

    /// Returns `true` for the lane extractions.
    #[must_use]
    pub fn is_extract(self) -> bool {
        use VectorOpcode as V;
        matches!(
            self,
            V::ExtractB
                | V::ExtractUB
                | V::ExtractC
                | V::ExtractS
                | V::ExtractI
                | V::ExtractL
                | V::ExtractF
                | V::ExtractD
        )
    }

    /// Returns the input positions holding vector operands.
    ///
    /// Shifts take the shifted vector at 1 and the count at 2; reductions take the
    /// scalar accumulator at 1 and the vector at 2; three-operand forms use 1..4.
    #[must_use]
    pub fn vector_operands(self) -> Range<usize> {
        use VectorOpcode as V;
        if self.is_shift() || self.is_extract() {
            return 1..2;
        }
        if self.is_reduction() {
            return 2..3;
        }
        match self {
            V::FmaVD | V::FmaVF | V::CMoveVF | V::CMoveVD | V::VectorBlend => 1..4,
            V::AbsV
            | V::AbsVF
            | V::AbsVD
            | V::NegVI
            | V::NegVF
            | V::NegVD
            | V::PopCountVI
            | V::SqrtVF
            | V::SqrtVD
            | V::NotV
            | V::VectorLoadMask
            | V::VectorStoreMask
            | V::VectorLoadShuffle
            | V::VectorReinterpret
            | V::VectorCastB2X
            | V::VectorCastS2X
            | V::VectorCastI2X
            | V::VectorCastL2X
            | V::VectorCastF2X
            | V::VectorCastD2X
            | V::VectorInsert => 1..2,
            V::ReplicateB
            | V::ReplicateS
            | V::ReplicateI
            | V::ReplicateL
            | V::ReplicateF
            | V::ReplicateD
            | V::PackB
            | V::PackS
            | V::PackI
            | V::PackL
            | V::PackF
            | V::PackD
            | V::LShiftCntV
            | V::RShiftCntV
            | V::SetVectMaskI => 1..1,
            _ => 1..3,
        }
    }

    /// Returns `true` if the operation may be emitted for `vlen` lanes of `bt` on a
    /// target whose widest vector register holds `max_vector_bytes`.
    ///
    /// Vectors must have a power-of-two lane count of at least two and fit between
    /// four bytes and the target maximum. Byte multiplies and long multiplies need at
    /// least 128-bit registers.
    #[must_use]
    pub fn implemented(self, vlen: u32, bt: BasicType, max_vector_bytes: u32) -> bool {
        if vlen < 2 || !vlen.is_power_of_two() || bt == BasicType::Object {
            return false;
        }
        let bytes = vlen * bt.size_in_bytes();
        if !(4..=max_vector_bytes).contains(&bytes) {
            return false;
        }
        match self {
            VectorOpcode::MulVB | VectorOpcode::MulVL | VectorOpcode::MulReductionVL => {
                max_vector_bytes >= 16
            }
            VectorOpcode::Pack2L | VectorOpcode::Pack2D => vlen == 2,
            _ => true,
        }
    }

    /// Returns the identity element a reduction of `op` over `bt` starts from.
    ///
    /// `Add`, `Sub`, `Or` and `Xor` start from zero, `Mul` from one, `And` from all
    /// bits set, `Min` from the largest and `Max` from the smallest representable value.
    #[must_use]
    pub fn reduction_identity(op: ScalarOp, bt: BasicType) -> Option<ConValue> {
        let lanes = lane_class(bt);
        let int_like = |v: i64| match lanes {
            BasicType::Long => Some(ConValue::Long(v)),
            BasicType::Byte | BasicType::Short | BasicType::Int => {
                i32::try_from(v).ok().map(ConValue::Int)
            }
            _ => None,
        };
        let (min, max) = match lanes {
            BasicType::Byte => (i64::from(i8::MIN), i64::from(i8::MAX)),
            BasicType::Short => (i64::from(i16::MIN), i64::from(i16::MAX)),
            BasicType::Int => (i64::from(i32::MIN), i64::from(i32::MAX)),
            _ => (i64::MIN, i64::MAX),
        };

        match (op, lanes) {
            (_, BasicType::Float) => match op {
                ScalarOp::Add | ScalarOp::Sub => Some(ConValue::float(0.0)),
                ScalarOp::Mul => Some(ConValue::float(1.0)),
                ScalarOp::Min => Some(ConValue::float(f32::INFINITY)),
                ScalarOp::Max => Some(ConValue::float(f32::NEG_INFINITY)),
                _ => None,
            },
            (_, BasicType::Double) => match op {
                ScalarOp::Add | ScalarOp::Sub => Some(ConValue::double(0.0)),
                ScalarOp::Mul => Some(ConValue::double(1.0)),
                ScalarOp::Min => Some(ConValue::double(f64::INFINITY)),
                ScalarOp::Max => Some(ConValue::double(f64::NEG_INFINITY)),
                _ => None,
            },
            (ScalarOp::Add | ScalarOp::Sub | ScalarOp::Or | ScalarOp::Xor, _) => int_like(0),
            (ScalarOp::Mul, _) => int_like(1),
            (ScalarOp::And, _) => int_like(-1),
            (ScalarOp::Min, _) => int_like(max),
            (ScalarOp::Max, _) => int_like(min),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_arithmetic_table() {
        assert_eq!(
            VectorOpcode::for_operation(ScalarOp::Add, BasicType::Int),
            Some(VectorOpcode::AddVI)
        );
        assert_eq!(
            VectorOpcode::for_operation(ScalarOp::Add, BasicType::Boolean),
            Some(VectorOpcode::AddVB)
        );
        assert_eq!(
            VectorOpcode::for_operation(ScalarOp::Mul, BasicType::Char),
            Some(VectorOpcode::MulVS)
        );
        assert_eq!(VectorOpcode::for_operation(ScalarOp::Div, BasicType::Int), None);
        assert_eq!(
            VectorOpcode::for_operation(ScalarOp::Abs, BasicType::Double),
            Some(VectorOpcode::AbsVD)
        );
        assert_eq!(VectorOpcode::for_operation(ScalarOp::And, BasicType::Float), None);
    }

    #[test]
    fn test_shift_table() {
        let shl = VectorOpcode::for_operation(ScalarOp::LShift, BasicType::Long);
        assert_eq!(shl, Some(VectorOpcode::LShiftVL));
        assert_eq!(
            VectorOpcode::URShiftVB.shift_count(),
            Some(VectorOpcode::RShiftCntV)
        );
        assert!(VectorOpcode::RShiftVI.is_shift());
        assert!(!VectorOpcode::AddVI.is_shift());
        assert_eq!(VectorOpcode::LShiftVI.vector_operands(), 1..2);
    }

    #[test]
    fn test_reduction_table() {
        assert_eq!(
            VectorOpcode::reduction(ScalarOp::Add, BasicType::Short),
            Some(VectorOpcode::AddReductionVI)
        );
        assert_eq!(
            VectorOpcode::reduction(ScalarOp::Sub, BasicType::Double),
            Some(VectorOpcode::SubReductionVFP)
        );
        assert_eq!(VectorOpcode::reduction(ScalarOp::Xor, BasicType::Float), None);
        assert!(VectorOpcode::MaxReductionV.is_reduction());
        assert_eq!(VectorOpcode::MulReductionVD.vector_operands(), 2..3);
    }

    #[test]
    fn test_reduction_identity() {
        assert_eq!(
            VectorOpcode::reduction_identity(ScalarOp::Mul, BasicType::Int),
            Some(ConValue::Int(1))
        );
        assert_eq!(
            VectorOpcode::reduction_identity(ScalarOp::And, BasicType::Long),
            Some(ConValue::Long(-1))
        );
        assert_eq!(
            VectorOpcode::reduction_identity(ScalarOp::Min, BasicType::Byte),
            Some(ConValue::Int(127))
        );
        assert_eq!(
            VectorOpcode::reduction_identity(ScalarOp::Max, BasicType::Float),
            Some(ConValue::float(f32::NEG_INFINITY))
        );
        assert_eq!(
            VectorOpcode::reduction_identity(ScalarOp::Xor, BasicType::Double),
            None
        );
    }

    #[test]
    fn test_lane_tables() {
        assert_eq!(
            VectorOpcode::replicate(BasicType::Char),
            Some(VectorOpcode::ReplicateS)
        );
        assert_eq!(VectorOpcode::pack(BasicType::Double), Some(VectorOpcode::PackD));
        assert_eq!(
            VectorOpcode::pack_pair(BasicType::Long),
            Some(VectorOpcode::Pack2L)
        );
        assert_eq!(
            VectorOpcode::extract(BasicType::Boolean),
            Some(VectorOpcode::ExtractUB)
        );
        assert_eq!(
            VectorOpcode::cast_from(BasicType::Byte),
            Some(VectorOpcode::VectorCastB2X)
        );
        assert_eq!(VectorOpcode::cast_from(BasicType::Boolean), None);
    }

    #[test]
    fn test_implemented() {
        assert!(VectorOpcode::AddVI.implemented(4, BasicType::Int, 32));
        assert!(!VectorOpcode::AddVI.implemented(3, BasicType::Int, 32));
        assert!(!VectorOpcode::AddVD.implemented(8, BasicType::Double, 32));
        assert!(!VectorOpcode::MulVL.implemented(2, BasicType::Long, 8));
        assert!(!VectorOpcode::AddVB.implemented(2, BasicType::Byte, 64));
    }

    #[test]
    fn test_every_opcode_has_operands() {
        for opcode in VectorOpcode::iter() {
            let range = opcode.vector_operands();
            assert!(range.start >= 1, "{opcode} starts at control input");
            assert!(range.end <= 4, "{opcode} has too many operands");
        }
    }

    #[test]
    fn test_store_mask_attr() {
        let op = VectorOp::store_mask(BasicType::Long);
        assert_eq!(op.opcode, VectorOpcode::VectorStoreMask);
        assert_eq!(op.attr, VectorAttr::MaskSize(8));
    }
}
