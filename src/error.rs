use thiserror::Error;

use crate::ir::{NodeId, TypeVect};

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into three categories, matching how the vector-box phase treats failures:
///
/// # Error Categories
///
/// ## Invariant Violations
/// These indicate a frontend or earlier-phase bug. They are fatal for the method being
/// compiled and always identify the offending node together with the expected and
/// actual shape or type.
/// - [`Error::ShapeMismatch`] - Vector shape disagrees with the declared shape
/// - [`Error::TypeMismatch`] - Static type of a node is not what the operation requires
/// - [`Error::MergeMismatch`] - Inconsistent merge shapes during box expansion
/// - [`Error::UnexpectedNode`] - A node of the wrong kind was found at an input
/// - [`Error::InvalidNode`] - Reference to a removed or out-of-range node
/// - [`Error::Invariant`] - Other structural violations, with source location
///
/// ## Metadata Errors
/// - [`Error::FieldNotFound`] - The metadata oracle has no such field
/// - [`Error::UnknownClass`] - A class handle is not known to the oracle
/// - [`Error::UnknownMethod`] - A method handle is not known to the oracle
///
/// ## Session Errors
/// - [`Error::RecursionLimit`] - Merge-shaped allocation nested beyond the configured depth
/// - [`Error::InliningConflict`] - Incremental inlining is already active
///
/// Resource exhaustion is *not* reported through this type: it is surfaced only through
/// the session's failing flag, see [`crate::compiler::Compile::failing`].
///
/// # Examples
///
/// ```rust,ignore
/// use vecbox::{Error, vector::PhaseVector};
///
/// match PhaseVector::new().optimize_vector_boxes(&mut compile) {
///     Ok(stats) if stats.bailed_out => println!("compilation discarded"),
///     Ok(stats) => println!("expanded {} boxes", stats.boxes_expanded),
///     Err(Error::MergeMismatch { node, message }) => eprintln!("bad merge at {node}: {message}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Invariant violations
    /// A vector value does not have the shape an operation declared for it.
    ///
    /// # Fields
    ///
    /// * `node` - The node whose input has the wrong shape
    /// * `expected` - The declared element type and lane count
    /// * `actual` - The element type and lane count actually found
    #[error("Shape mismatch at {node}: expected {expected}, found {actual}")]
    ShapeMismatch {
        /// The offending node
        node: NodeId,
        /// Declared shape
        expected: TypeVect,
        /// Shape actually found
        actual: TypeVect,
    },

    /// The static type of a node is not assignable to what an operation requires.
    ///
    /// Raised, for example, when an unbox reads from an object that is not a member of
    /// the boxed-vector family.
    #[error("Type mismatch at {node}: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The offending node
        node: NodeId,
        /// Description of the required type
        expected: String,
        /// Description of the type actually found
        actual: String,
    },

    /// Allocation and value merges of a vector box do not line up.
    ///
    /// The allocation input and the vector input of a box must merge at the same region
    /// with the same number of incoming paths.
    #[error("Merge mismatch at {node}: {message}")]
    MergeMismatch {
        /// The merge node where the mismatch was detected
        node: NodeId,
        /// Details of the mismatch
        message: String,
    },

    /// A node of an unexpected kind was found where a specific kind is required.
    #[error("Unexpected node {node}: expected {expected}, found {actual}")]
    UnexpectedNode {
        /// The offending node
        node: NodeId,
        /// The kind of node required
        expected: &'static str,
        /// The kind of node found
        actual: String,
    },

    /// A node id does not refer to a live node of the graph.
    #[error("Invalid node reference - {0}")]
    InvalidNode(NodeId),

    /// A structural invariant of the graph was violated.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violation
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violated - {file}:{line}: {message}")]
    Invariant {
        /// The message to be printed for the violation
        message: String,
        /// The source file in which this violation was detected
        file: &'static str,
        /// The source line in which this violation was detected
        line: u32,
    },

    // Metadata errors
    /// The metadata oracle does not know the requested field.
    #[error("Field '{field}' not found in class '{class}'")]
    FieldNotFound {
        /// Name of the class that was searched
        class: String,
        /// Name of the requested field
        field: String,
    },

    /// A class handle is not known to the metadata oracle.
    #[error("Unknown class handle - {0}")]
    UnknownClass(u32),

    /// A method handle is not known to the metadata oracle.
    #[error("Unknown method handle - {0}")]
    UnknownMethod(u32),

    // Session errors
    /// Reach the maximum merge nesting allowed while expanding a vector box.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Incremental inlining was already active when the phase tried to enter it.
    ///
    /// Two phases that perform incremental inlining must never be active at the same time.
    #[error("Incremental inlining is already in progress")]
    InliningConflict,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` if this error describes a violated IR invariant.
    ///
    /// Invariant violations indicate a bug in an earlier phase; the compilation of the
    /// current method must be abandoned.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Error::ShapeMismatch { .. }
                | Error::TypeMismatch { .. }
                | Error::MergeMismatch { .. }
                | Error::UnexpectedNode { .. }
                | Error::InvalidNode(_)
                | Error::Invariant { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BasicType;

    #[test]
    fn test_shape_mismatch_display() {
        let err = Error::ShapeMismatch {
            node: NodeId::new(7),
            expected: TypeVect::new(BasicType::Int, 4),
            actual: TypeVect::new(BasicType::Long, 2),
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch at n7: expected int x 4, found long x 2"
        );
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_invariant_macro_captures_location() {
        let err = invariant_error!("bad edge {}", 3);
        match err {
            Error::Invariant {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "bad edge 3");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_session_errors_are_not_invariants() {
        assert!(!Error::RecursionLimit(64).is_invariant_violation());
        assert!(!Error::InliningConflict.is_invariant_violation());
    }
}
