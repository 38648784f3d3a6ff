//! Error types for ndgrad.

use crate::scalar::DType;
use thiserror::Error;

/// Errors that can occur in array kernels and differentiation passes.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Data length does not match the number of elements implied by a shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Two shapes cannot be combined (broadcasting, matmul, element-wise).
    #[error("incompatible shapes {lhs:?} and {rhs:?}")]
    IncompatibleShapes { lhs: Vec<usize>, rhs: Vec<usize> },

    /// A cotangent or tangent cannot be matched to the value it belongs to.
    #[error("cotangent of shape {actual:?} cannot be reduced to shape {expected:?}")]
    CotangentShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Invalid permutation.
    #[error("invalid permutation {perm:?} for array with {ndim} dimensions")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// Axis argument outside `0..ndim`, or repeated.
    #[error("invalid axis {axis} for array with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    /// Operation requires specific rank.
    #[error("expected array of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// Slice step of zero.
    #[error("slice step must be positive, got {step} for dimension {dim}")]
    InvalidSliceStep { dim: usize, step: isize },

    /// Gradient tracking requested for an element type without derivatives.
    #[error("element type {dtype} is not differentiable")]
    NotDifferentiable { dtype: DType },

    /// `backward()` without a seed on an output with more than one element.
    #[error("an explicit cotangent is required for an output with {len} elements")]
    MissingSeed { len: usize },

    /// The value was not produced by a recorded operation and is not a tracked leaf.
    #[error("value is not part of a recorded graph")]
    NotTracked,

    /// retain/unretain on a value that has no producing operation.
    #[error("only values produced by a recorded operation can retain gradients")]
    InvalidRetain,

    /// An input or output of a recorded operation was mutated in place
    /// afterwards. `role` is `"input"` or `"output"` and `slot` indexes into
    /// that side of the node.
    #[error("{role} {slot} of node {node} ({op}) was modified in place after being recorded")]
    StaleGraph {
        node: u64,
        op: &'static str,
        role: &'static str,
        slot: usize,
    },

    /// Number of arguments does not match.
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    /// Operation cannot be performed.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}
