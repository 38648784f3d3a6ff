//! Array kernels.
//!
//! Plain functions over [`Array`](crate::Array) values. They know nothing
//! about gradients; the `autograd` module wraps each one together with its
//! derivative rules.

mod broadcast;
mod concat;
mod elementwise;
mod matmul;
mod permutedims;
mod reduce;
mod slice;

pub use broadcast::{broadcast_shape, broadcast_to, sum_to_shape};
pub use concat::{concat, split};
pub use elementwise::{
    add, apply, apply_binary, apply_f64, div, mul, neg, positive_mask, scale, sub, zip_broadcast,
};
pub use matmul::{MatmulShapes, matmul, matrix_transpose};
pub use permutedims::{
    inverse_permutation, permutedims, swap_permutation, transpose, validate_permutation,
};
pub use reduce::{max_axes, min_axes, reduced_shape, reduction_count, sum_axes, validate_axes};
pub use slice::{ResolvedSlice, SliceRange, slice};
